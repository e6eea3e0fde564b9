use crate::error::AppError;
use bcrypt::{hash, verify};

/// Hashes `password` with bcrypt at the given work factor.
pub fn hash_password(password: &str, cost: u32) -> Result<String, AppError> {
    hash(password, cost)
        .map_err(|e| AppError::InternalServerError(format!("Failed to hash password: {}", e)))
}

pub fn verify_password(password: &str, hashed_password: &str) -> Result<bool, AppError> {
    verify(password, hashed_password)
        .map_err(|e| AppError::InternalServerError(format!("Failed to verify password: {}", e)))
}

/// Performs a bcrypt round at `cost` for a login whose username is unknown, so
/// that failed lookups take as long as wrong passwords. Always `false`.
pub fn verify_unknown_user(password: &str, cost: u32) -> bool {
    if let Err(e) = hash(password, cost) {
        log::error!("Failed to run decoy password check: {}", e);
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_COST: u32 = 4;

    #[test]
    fn test_password_hashing_and_verification() {
        let password = "test_password123";
        let hashed = hash_password(password, TEST_COST).unwrap();

        assert_ne!(hashed, password);
        assert!(verify_password(password, &hashed).unwrap());
        assert!(!verify_password("wrong_password", &hashed).unwrap());
    }

    #[test]
    fn test_unknown_user_check_never_matches() {
        assert!(!verify_unknown_user("test_password123", TEST_COST));
        assert!(!verify_unknown_user("test_password123", 2));
    }

    #[test]
    fn test_invalid_cost_is_an_error() {
        assert!(matches!(
            hash_password("whatever", 2),
            Err(AppError::InternalServerError(_))
        ));
    }

    #[test]
    fn test_verify_with_invalid_hash() {
        match verify_password("test_password123", "invalidhashformat") {
            Err(AppError::InternalServerError(msg)) => {
                assert!(msg.contains("Failed to verify password"));
            }
            // Some bcrypt versions report a malformed hash as a plain mismatch.
            Ok(false) => {}
            Ok(true) => panic!("Password verification should fail for invalid hash format"),
            Err(e) => panic!("Unexpected error: {:?}", e),
        }
    }
}
