use super::*;

#[test]
fn anonymous_name_is_deterministic_for_same_user_id() {
    let user_id = Uuid::new_v4();
    assert_eq!(anonymous_name(user_id), anonymous_name(user_id));
}

#[test]
fn anonymous_name_follows_expected_shape() {
    let name = anonymous_name(Uuid::new_v4());
    assert!(name.starts_with("Anonymous "));
    let animal = name.strip_prefix("Anonymous ").unwrap();
    assert!(ANIMALS.contains(&animal));
}

#[test]
fn avatar_color_is_deterministic_and_from_palette() {
    let user_id = Uuid::new_v4();
    let color = avatar_color(user_id);
    assert_eq!(color, avatar_color(user_id));
    assert!(PALETTE.contains(&color.as_str()));
}

#[test]
fn resolve_prefers_verified_token_subject_over_client_id() {
    let verified = Uuid::new_v4();
    let client_id = Uuid::new_v4();
    let identity = resolve(Some(verified), Some(client_id.to_string().as_str()), None, false);
    assert_eq!(identity.user_id, verified);
    assert!(!identity.is_anonymous);
}

#[test]
fn resolve_falls_back_to_client_id_without_verified_user() {
    let client_id = Uuid::new_v4();
    let identity = resolve(None, Some(client_id.to_string().as_str()), None, false);
    assert_eq!(identity.user_id, client_id);
    assert!(identity.is_anonymous, "no verified user means the resolved identity is anonymous");
}

#[test]
fn resolve_synthesizes_uuid_when_no_verified_user_or_client_id() {
    let a = resolve(None, None, None, false);
    let b = resolve(None, None, None, false);
    assert_ne!(a.user_id, b.user_id, "each call with no anchor should mint a fresh identity");
}

#[test]
fn resolve_honors_explicit_display_name() {
    let identity = resolve(None, None, Some("Captain Ink".to_owned()), true);
    assert_eq!(identity.display_name, "Captain Ink");
}

#[test]
fn resolve_uses_anonymous_name_when_display_name_absent() {
    let identity = resolve(None, None, None, true);
    assert!(identity.display_name.starts_with("Anonymous "));
}
