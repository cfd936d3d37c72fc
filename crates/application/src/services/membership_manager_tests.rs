//! 群组成员管理测试

use std::sync::Arc;

use domain::{ConversationId, ConversationKind, DomainError, ErrorKind, PhotoLocator, UserId};

use crate::{
    error::ApplicationError,
    locks::KeyedLocks,
    memory::InMemoryStore,
    repository::ConversationRepository,
    services::{
        membership_manager::{MembershipManager, MembershipManagerDependencies},
        test_support::{open, register},
    },
};

fn manager(store: &InMemoryStore) -> MembershipManager {
    MembershipManager::new(MembershipManagerDependencies {
        user_repository: Arc::new(store.clone()),
        conversation_repository: Arc::new(store.clone()),
        locks: Arc::new(KeyedLocks::new()),
    })
}

async fn participants(store: &InMemoryStore, id: ConversationId) -> Vec<UserId> {
    ConversationRepository::find_by_id(store, id)
        .await
        .unwrap()
        .unwrap()
        .participants
}

#[tokio::test]
async fn member_can_add_new_user() {
    let store = InMemoryStore::new();
    let alice = register(&store, "alice").await;
    let bob = register(&store, "bob").await;
    let carol = register(&store, "carol").await;
    let group = open(&store, ConversationKind::Group, alice, &[bob]).await;

    let updated = manager(&store).add_member(bob, group.id, carol).await.unwrap();

    assert_eq!(updated.participants, vec![alice, bob, carol]);
    assert_eq!(participants(&store, group.id).await, vec![alice, bob, carol]);
}

#[tokio::test]
async fn adding_rejects_existing_or_unknown_users() {
    let store = InMemoryStore::new();
    let alice = register(&store, "alice").await;
    let bob = register(&store, "bob").await;
    let group = open(&store, ConversationKind::Group, alice, &[bob]).await;
    let manager = manager(&store);

    let err = manager.add_member(alice, group.id, bob).await.unwrap_err();
    assert!(matches!(
        err,
        ApplicationError::Domain(DomainError::AlreadyParticipant(id)) if id == bob
    ));

    let err = manager
        .add_member(alice, group.id, UserId::generate())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(participants(&store, group.id).await, vec![alice, bob]);
}

#[tokio::test]
async fn outsider_cannot_change_group() {
    let store = InMemoryStore::new();
    let alice = register(&store, "alice").await;
    let bob = register(&store, "bob").await;
    let mallory = register(&store, "mallory").await;
    let group = open(&store, ConversationKind::Group, alice, &[bob]).await;
    let manager = manager(&store);

    let err = manager.add_member(mallory, group.id, mallory).await.unwrap_err();
    assert!(matches!(err, ApplicationError::Domain(DomainError::NotParticipant)));

    let err = manager
        .set_group_name(mallory, group.id, "hijacked".to_owned())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);

    let photo = PhotoLocator::new("/photos/evil.png").unwrap();
    let err = manager
        .set_group_photo(mallory, group.id, photo)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);
}

#[tokio::test]
async fn direct_conversation_membership_is_fixed() {
    let store = InMemoryStore::new();
    let alice = register(&store, "alice").await;
    let bob = register(&store, "bob").await;
    let carol = register(&store, "carol").await;
    let direct = open(&store, ConversationKind::Direct, alice, &[bob]).await;
    let manager = manager(&store);

    let err = manager.add_member(alice, direct.id, carol).await.unwrap_err();
    assert!(matches!(err, ApplicationError::Domain(DomainError::NotAGroup(_))));

    let err = manager.leave_group(direct.id, alice).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = manager
        .set_group_name(alice, direct.id, "renamed".to_owned())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    assert_eq!(participants(&store, direct.id).await, vec![alice, bob]);
}

#[tokio::test]
async fn leaving_twice_is_idempotent_and_keeps_empty_group() {
    let store = InMemoryStore::new();
    let alice = register(&store, "alice").await;
    let bob = register(&store, "bob").await;
    let group = open(&store, ConversationKind::Group, alice, &[bob]).await;
    let manager = manager(&store);

    manager.leave_group(group.id, bob).await.unwrap();
    manager.leave_group(group.id, bob).await.unwrap();
    assert_eq!(participants(&store, group.id).await, vec![alice]);

    manager.leave_group(group.id, alice).await.unwrap();
    assert!(participants(&store, group.id).await.is_empty());
}

#[tokio::test]
async fn unknown_group_is_not_found() {
    let store = InMemoryStore::new();
    let alice = register(&store, "alice").await;

    let err = manager(&store)
        .leave_group(ConversationId::generate(), alice)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ApplicationError::Domain(DomainError::ConversationNotFound)
    ));
}

#[tokio::test]
async fn member_can_rename_and_rephoto() {
    let store = InMemoryStore::new();
    let alice = register(&store, "alice").await;
    let bob = register(&store, "bob").await;
    let group = open(&store, ConversationKind::Group, alice, &[bob]).await;
    let manager = manager(&store);

    let renamed = manager
        .set_group_name(bob, group.id, "weekend plans".to_owned())
        .await
        .unwrap();
    assert_eq!(renamed.name.map(|n| n.as_str().to_owned()), Some("weekend plans".to_owned()));

    let err = manager
        .set_group_name(bob, group.id, "  ".to_owned())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let photo = PhotoLocator::new("/photos/group.png").unwrap();
    let updated = manager
        .set_group_photo(alice, group.id, photo.clone())
        .await
        .unwrap();
    assert_eq!(updated.photo, Some(photo));
}

#[tokio::test]
async fn group_edit_authorization_matches_the_edit_rules() {
    let store = InMemoryStore::new();
    let alice = register(&store, "alice").await;
    let bob = register(&store, "bob").await;
    let mallory = register(&store, "mallory").await;
    let group = open(&store, ConversationKind::Group, alice, &[bob]).await;
    let direct = open(&store, ConversationKind::Direct, alice, &[bob]).await;
    let manager = manager(&store);

    manager.authorize_group_edit(bob, group.id).await.unwrap();

    let err = manager.authorize_group_edit(mallory, group.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);

    let err = manager.authorize_group_edit(alice, direct.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = manager
        .authorize_group_edit(alice, ConversationId::generate())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}
