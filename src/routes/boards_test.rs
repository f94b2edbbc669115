use super::*;

#[test]
fn store_error_to_status_maps_not_found_variants() {
    assert_eq!(store_error_to_status(&StoreError::BoardNotFound(Uuid::nil())), StatusCode::NOT_FOUND);
    assert_eq!(store_error_to_status(&StoreError::NotOwner(Uuid::nil())), StatusCode::NOT_FOUND);
}

#[test]
fn store_error_to_status_maps_persistence_failures_to_500() {
    let seq_collision = StoreError::SeqCollision { board_id: Uuid::nil(), seq: 1 };
    assert_eq!(store_error_to_status(&seq_collision), StatusCode::INTERNAL_SERVER_ERROR);
}

#[test]
fn board_response_from_board_preserves_fields() {
    let board = Board { id: Uuid::new_v4(), created_at: Utc::now(), name: "Board".to_owned(), owner_id: None, is_private: true };
    let id = board.id;
    let response: BoardResponse = board.into();
    assert_eq!(response.id, id);
    assert_eq!(response.name, "Board");
    assert!(response.is_private);
    assert!(response.owner_id.is_none());
}
