use axum::{Extension, Json};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use pbkdf2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use pbkdf2::Pbkdf2;
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use std::ops::Add;
use std::sync::Arc;

use crate::err::Error;
use crate::models::{
    normalize_email, normalize_student_id, valid_email, LoggedInStudent, LoginStudent,
    RegisterStudent, StudentProfile, StudentRecord,
};
use crate::store::StudentStore;
use crate::{breaks, creates, proceeds, Payload};

// one message for both unknown id and wrong password
const BAD_CREDENTIALS: &str = "Invalid student id or password!";

pub fn hash_password(plain: &str) -> Result<String, Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Pbkdf2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|err| Error::internal("HashError", err.to_string()))?;
    Ok(hash.to_string())
}

// a mismatch is `Ok(false)`; only a corrupt stored hash is an error
pub fn verify_password(plain: &str, hash: &str) -> Result<bool, Error> {
    let parsed = PasswordHash::new(hash)
        .map_err(|err| Error::internal("HashError", format!("Malformed stored hash: {}", err)))?;
    match Pbkdf2.verify_password(plain.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(pbkdf2::password_hash::Error::Password) => Ok(false),
        Err(err) => Err(Error::internal("HashError", err.to_string())),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenKeys {
    pub fn from_secret(secret: &str, ttl_secs: u64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::seconds(ttl_secs as i64),
        }
    }

    pub fn issue(&self, subject: &str) -> Result<(String, DateTime<Utc>), Error> {
        let now = Utc::now();
        let expires_at = now.add(self.ttl);
        let claims = Claims {
            sub: subject.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };
        let token = jsonwebtoken::encode(&Header::default(), &claims, &self.encoding)
            .map_err(|err| Error::internal("TokenError", err.to_string()))?;
        Ok((token, expires_at))
    }

    // fails closed: every decode failure is an invalid token
    pub fn verify(&self, token: &str) -> Result<String, Error> {
        let mut validation = Validation::default();
        validation.leeway = 0;
        jsonwebtoken::decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims.sub)
            .map_err(|_| Error::InvalidToken)
    }
}

pub async fn register_student(
    payload: Option<Json<RegisterStudent>>,
    Extension(store): Extension<StudentStore>,
) -> Payload<StudentProfile> {
    let student = match payload {
        Some(Json(student)) => student,
        None => return breaks(Error::invalid("Missing registration payload!")),
    };

    let student_id = normalize_student_id(&student.student_id);
    let email = normalize_email(&student.email);
    if student_id.is_empty()
        || student.name.is_empty()
        || email.is_empty()
        || student.password.is_empty()
    {
        return breaks(Error::invalid(
            "`studentId`, `name`, `email` and `password` must all be provided!",
        ));
    }
    if !valid_email(&email) {
        return breaks(Error::invalid(format!(
            "`{}` is not a valid email address!",
            email
        )));
    }

    // fast path only; the unique indexes are the actual duplicate guard
    if let Some(existing) = store
        .find_by_student_id_or_email(&student_id, &email)
        .await?
    {
        let message = if existing.student_id == student_id {
            format!("Student with id `{}` already exists!", student_id)
        } else {
            format!("Student with email `{}` already exists!", email)
        };
        return breaks(Error::AlreadyExists { message });
    }

    let record = StudentRecord {
        student_id,
        name: student.name,
        email,
        password_hash: hash_password(&student.password)?,
        created_at: Utc::now(),
    };
    store.create(&record).await?;

    creates(StudentProfile::from(record))
}

pub async fn login_student(
    payload: Option<Json<LoginStudent>>,
    Extension(store): Extension<StudentStore>,
    Extension(keys): Extension<Arc<TokenKeys>>,
) -> Payload<LoggedInStudent> {
    let login = match payload {
        Some(Json(login)) => login,
        None => return breaks(Error::invalid("Missing login payload!")),
    };

    let student_id = normalize_student_id(&login.student_id);
    if student_id.is_empty() || login.password.is_empty() {
        return breaks(Error::invalid(
            "`studentId` and `password` must both be provided!",
        ));
    }

    let student = match store.find_by_student_id(&student_id).await? {
        Some(student) => student,
        None => {
            return breaks(Error::AuthenticationFailure {
                message: BAD_CREDENTIALS.to_string(),
            })
        }
    };

    if !verify_password(&login.password, &student.password_hash)? {
        return breaks(Error::AuthenticationFailure {
            message: BAD_CREDENTIALS.to_string(),
        });
    }

    let (token, expires_at) = keys.issue(&student.student_id)?;
    proceeds(LoggedInStudent {
        token,
        expires_at,
        student: student.into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashed_passwords_verify() {
        let hash = hash_password("p@ss1234").unwrap();
        assert!(verify_password("p@ss1234", &hash).unwrap());
        assert!(!verify_password("wrong", &hash).unwrap());
    }

    #[test]
    fn same_password_hashes_differently() {
        let first = hash_password("p@ss1234").unwrap();
        let second = hash_password("p@ss1234").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn corrupt_hash_is_an_internal_error_not_a_mismatch() {
        let result = verify_password("p@ss1234", "not-a-phc-string");
        assert!(matches!(result, Err(Error::InternalError { .. })));
    }

    #[test]
    fn issued_tokens_verify_to_their_subject() {
        let keys = TokenKeys::from_secret("test-secret", 3600);
        let (token, expires_at) = keys.issue("S1").unwrap();
        assert!(expires_at > Utc::now());
        assert_eq!(keys.verify(&token).unwrap(), "S1");
    }

    #[test]
    fn tampered_tokens_fail() {
        let keys = TokenKeys::from_secret("test-secret", 3600);
        let (token, _) = keys.issue("S1").unwrap();
        let last = if token.ends_with('A') { 'B' } else { 'A' };
        let tampered = format!("{}{}", &token[..token.len() - 1], last);
        assert!(matches!(keys.verify(&tampered), Err(Error::InvalidToken)));
    }

    #[test]
    fn tokens_signed_with_another_secret_fail() {
        let keys = TokenKeys::from_secret("test-secret", 3600);
        let other = TokenKeys::from_secret("other-secret", 3600);
        let (token, _) = other.issue("S1").unwrap();
        assert!(matches!(keys.verify(&token), Err(Error::InvalidToken)));
    }

    #[test]
    fn expired_tokens_fail() {
        let keys = TokenKeys::from_secret("test-secret", 3600);
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: "S1".to_string(),
            iat: now - 7200,
            exp: now - 3600,
        };
        let token = jsonwebtoken::encode(&Header::default(), &claims, &keys.encoding).unwrap();
        assert!(matches!(keys.verify(&token), Err(Error::InvalidToken)));
    }

    #[test]
    fn garbage_tokens_fail() {
        let keys = TokenKeys::from_secret("test-secret", 3600);
        assert!(matches!(keys.verify(""), Err(Error::InvalidToken)));
        assert!(matches!(
            keys.verify("definitely.not.a-token"),
            Err(Error::InvalidToken)
        ));
    }
}
