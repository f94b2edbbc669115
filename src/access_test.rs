use super::*;
use crate::model::Board;
use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header};
use serde::Serialize;

fn board(is_private: bool, owner_id: Option<Uuid>) -> Board {
    Board { id: Uuid::new_v4(), created_at: Utc::now(), name: "Board".to_owned(), owner_id, is_private }
}

#[derive(Serialize)]
struct TestClaims {
    sub: Uuid,
}

fn sign(secret: &str, sub: Uuid) -> String {
    jsonwebtoken::encode(&Header::default(), &TestClaims { sub }, &EncodingKey::from_secret(secret.as_bytes()))
        .expect("token should encode")
}

#[test]
fn verify_returns_none_without_secret_configured() {
    let access = AccessControl::new(None);
    assert!(access.verify(Some("anything")).is_none());
}

#[test]
fn verify_returns_none_without_token() {
    let access = AccessControl::new(Some("secret".to_owned()));
    assert!(access.verify(None).is_none());
}

#[test]
fn verify_recovers_subject_from_valid_token() {
    let access = AccessControl::new(Some("secret".to_owned()));
    let user_id = Uuid::new_v4();
    let token = sign("secret", user_id);
    assert_eq!(access.verify(Some(&token)), Some(user_id));
}

#[test]
fn verify_rejects_token_signed_with_wrong_secret() {
    let access = AccessControl::new(Some("secret".to_owned()));
    let token = sign("wrong-secret", Uuid::new_v4());
    assert!(access.verify(Some(&token)).is_none());
}

#[test]
fn can_join_allows_anyone_on_public_board() {
    let access = AccessControl::new(None);
    assert!(access.can_join(&board(false, None), None).is_ok());
}

#[test]
fn can_join_allows_owner_on_private_board() {
    let access = AccessControl::new(None);
    let owner_id = Uuid::new_v4();
    assert!(access.can_join(&board(true, Some(owner_id)), Some(owner_id)).is_ok());
}

#[test]
fn can_join_rejects_non_owner_on_private_board() {
    let access = AccessControl::new(None);
    let owner_id = Uuid::new_v4();
    let other = Uuid::new_v4();
    assert!(access.can_join(&board(true, Some(owner_id)), Some(other)).is_err());
}

#[test]
fn can_join_rejects_unverified_caller_on_private_board() {
    let access = AccessControl::new(None);
    let owner_id = Uuid::new_v4();
    assert!(access.can_join(&board(true, Some(owner_id)), None).is_err());
}
