pub mod tasks;

pub use tasks::{Criteria, TaskService};
