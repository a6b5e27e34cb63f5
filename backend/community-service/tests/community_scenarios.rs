//! Integration Tests: community threads end to end
//!
//! Coverage:
//! - Reply ownership tiers (author, post owner, privileged roles)
//! - Like toggle parity on every node level
//! - Merged feed ordering and pagination
//! - Poll voting and authored listings
//! - Realtime notifications after mutations
//!
//! Runs against `CommunityService` on the in-memory store.

mod common;

use common::Harness;
use community_service::domain::Role;
use community_service::error::AppError;
use community_service::middleware::{ModerationPolicy, OrganizerScope};
use community_service::models::{NodePath, PostKind};
use community_service::realtime::EventName;
use community_service::services::{
    ChildEdit, FeedPage, NewChild, NewPost, PostEdit, ServiceSettings,
};
use std::time::Duration;
use uuid::Uuid;

fn child(body: &str) -> NewChild {
    NewChild { body: body.into() }
}

fn edit(body: &str) -> ChildEdit {
    ChildEdit {
        body: body.into(),
        expected_version: None,
    }
}

#[tokio::test]
async fn test_reply_ownership_scenario() {
    let h = Harness::new();
    let u1 = h.user("ada", Role::Member);
    let u2 = h.user("grace", Role::Member);
    let u3 = h.user("linus", Role::Member);

    let q1 = h
        .service
        .create_post(&u1, NewPost::question("How do I join the robotics club?"))
        .await
        .unwrap();
    let (_, a1) = h
        .service
        .add_child(&u2, q1.id, NodePath::Post, child("Ask at the fair"))
        .await
        .unwrap();
    let (_, r1) = h
        .service
        .add_child(&u3, q1.id, a1, child("The fair is on Friday"))
        .await
        .unwrap();
    assert!(matches!(r1, NodePath::Reply { .. }));

    // Editing is author-only, even for the answer's author.
    let err = h
        .service
        .edit_child(&u2, q1.id, r1, edit("hijacked"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    // ...and even for the post owner.
    let err = h
        .service
        .edit_child(&u1, q1.id, r1, edit("hijacked"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let view = h
        .service
        .edit_child(&u3, q1.id, r1, edit("The fair is on Saturday"))
        .await
        .unwrap();
    assert_eq!(view.children[0].replies[0].body, "The fair is on Saturday");

    // The post owner may delete a reply it did not write.
    let view = h
        .service
        .delete_child(&u1, q1.id, r1, None)
        .await
        .unwrap();
    assert!(view.children[0].replies.is_empty());
    assert_eq!(view.children.len(), 1);

    let err = h
        .service
        .edit_child(&u3, q1.id, r1, edit("too late"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_bystander_cannot_delete_but_institution_can() {
    let h = Harness::new();
    let owner = h.user("owner", Role::Member);
    let author = h.user("author", Role::Member);
    let bystander = h.user("bystander", Role::Member);
    let organizer = h.user("club", Role::Organizer);
    let college = h.user("college", Role::Institution);

    let post = h
        .service
        .create_post(&owner, NewPost::question("Library hours?"))
        .await
        .unwrap();
    let (_, answer) = h
        .service
        .add_child(&author, post.id, NodePath::Post, child("9 to 5"))
        .await
        .unwrap();

    for caller in [&bystander, &organizer] {
        let err = h
            .service
            .delete_child(caller, post.id, answer, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    let view = h
        .service
        .delete_child(&college, post.id, answer, None)
        .await
        .unwrap();
    assert!(view.children.is_empty());
}

#[tokio::test]
async fn test_organizer_scope_limits_moderation_to_announcements() {
    let h = Harness::with_policy(ModerationPolicy {
        organizer_scope: OrganizerScope::Announcements,
        mask_forbidden_as_not_found: false,
    });
    let club_a = h.user("chess", Role::Organizer);
    let club_b = h.user("drama", Role::Organizer);
    let member = h.user("member", Role::Member);

    let announcement = h
        .service
        .create_post(&club_a, NewPost::announcement("Tryouts", "Monday at 6"))
        .await
        .unwrap();
    let (_, comment) = h
        .service
        .add_child(&member, announcement.id, NodePath::Post, child("spam"))
        .await
        .unwrap();
    h.service
        .delete_child(&club_b, announcement.id, comment, None)
        .await
        .unwrap();

    let question = h
        .service
        .create_post(&member, NewPost::question("Any tryouts?"))
        .await
        .unwrap();
    let err = h
        .service
        .delete_post(&club_b, question.id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
}

#[tokio::test]
async fn test_masked_denials_read_as_missing() {
    let h = Harness::with_policy(ModerationPolicy {
        organizer_scope: OrganizerScope::None,
        mask_forbidden_as_not_found: true,
    });
    let owner = h.user("owner", Role::Member);
    let other = h.user("other", Role::Member);

    let post = h
        .service
        .create_post(&owner, NewPost::question("Parking?"))
        .await
        .unwrap();
    let err = h
        .service
        .delete_post(&other, post.id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_like_toggle_parity_on_every_level() {
    let h = Harness::new();
    let u1 = h.user("u1", Role::Member);
    let u2 = h.user("u2", Role::Member);

    let post = h
        .service
        .create_post(&u1, NewPost::question("Best study spot?"))
        .await
        .unwrap();
    let (_, a1) = h
        .service
        .add_child(&u2, post.id, NodePath::Post, child("Third floor"))
        .await
        .unwrap();
    let (_, r1) = h
        .service
        .add_child(&u1, post.id, a1, child("Agreed"))
        .await
        .unwrap();

    for path in [NodePath::Post, a1, r1] {
        let first = h.service.toggle_like(&u1, post.id, path).await.unwrap();
        assert!(first.liked);
        assert_eq!(first.likes, vec![u1.identity]);
        assert_eq!(first.like_count, 1);

        let second = h.service.toggle_like(&u1, post.id, path).await.unwrap();
        assert!(!second.liked);
        assert!(second.likes.is_empty());
        assert_eq!(second.like_count, 0);
    }

    let view = h.service.get_post(&u2, post.id).await.unwrap();
    assert!(view.likes.is_empty());
    assert!(view.children[0].likes.is_empty());
    assert!(view.children[0].replies[0].likes.is_empty());
}

#[tokio::test]
async fn test_concurrent_likes_from_many_callers_all_land() {
    let settings = ServiceSettings {
        like_toggle_max_attempts: 32,
        ..ServiceSettings::default()
    };
    let h = Harness::with(ModerationPolicy::default(), settings);
    let owner = h.user("owner", Role::Member);
    let post = h
        .service
        .create_post(&owner, NewPost::question("Popular?"))
        .await
        .unwrap();

    let callers: Vec<_> = (0..12)
        .map(|i| h.user(&format!("fan{i}"), Role::Member))
        .collect();
    let toggles = callers.iter().map(|caller| {
        let service = h.service.clone();
        let caller = *caller;
        async move { service.toggle_like(&caller, post.id, NodePath::Post).await }
    });

    for result in futures::future::join_all(toggles).await {
        assert!(result.unwrap().liked);
    }

    let view = h.service.get_post(&owner, post.id).await.unwrap();
    assert_eq!(view.like_count, callers.len());
}

#[tokio::test]
async fn test_feed_merges_both_variants_newest_first() {
    let h = Harness::new();
    let member = h.user("member", Role::Member);
    let club = h.user("club", Role::Organizer);

    let q1 = h
        .service
        .create_post(&member, NewPost::question("Where is room 101?"))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    let announcement = h
        .service
        .create_post(&club, NewPost::announcement("Open day", "All welcome"))
        .await
        .unwrap();

    let feed = h
        .service
        .get_feed(&member, FeedPage::default())
        .await
        .unwrap();

    assert_eq!(feed.total_count, 2);
    assert!(!feed.has_more);
    assert!(feed.cursor.is_none());

    let ids: Vec<Uuid> = feed.posts.iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![announcement.id, q1.id]);
    assert!(feed.posts[0].created_at > feed.posts[1].created_at);

    let announcement_view = feed
        .posts
        .iter()
        .find(|p| p.kind == PostKind::Announcement)
        .unwrap();
    assert_eq!(announcement_view.title.as_deref(), Some("Open day"));
    assert_eq!(announcement_view.profile.display_name, "club");
    assert_eq!(announcement_view.profile.display_role, "ClubHead");
}

#[tokio::test]
async fn test_feed_pages_cover_everything_once() {
    let h = Harness::new();
    let member = h.user("member", Role::Member);
    let club = h.user("club", Role::Organizer);

    let mut created = Vec::new();
    for i in 0..4 {
        let q = h
            .service
            .create_post(&member, NewPost::question(format!("question {i}")))
            .await
            .unwrap();
        created.push(q.id);
        let a = h
            .service
            .create_post(&club, NewPost::announcement(format!("notice {i}"), "details"))
            .await
            .unwrap();
        created.push(a.id);
    }

    let mut seen = Vec::new();
    let mut cursor = None;
    loop {
        let page = h
            .service
            .get_feed(
                &member,
                FeedPage {
                    limit: Some(3),
                    cursor: cursor.clone(),
                },
            )
            .await
            .unwrap();
        assert_eq!(page.total_count, created.len());
        seen.extend(page.posts.iter().map(|p| p.id));
        if !page.has_more {
            break;
        }
        cursor = page.cursor;
    }

    let full = h
        .service
        .get_feed(&member, FeedPage::default())
        .await
        .unwrap();
    let full_ids: Vec<Uuid> = full.posts.iter().map(|p| p.id).collect();
    assert_eq!(seen, full_ids);
    assert_eq!(seen.len(), created.len());
}

#[tokio::test]
async fn test_default_page_size_applies_when_unspecified() {
    let settings = ServiceSettings {
        feed_default_page_size: Some(2),
        ..ServiceSettings::default()
    };
    let h = Harness::with(ModerationPolicy::default(), settings);
    let member = h.user("member", Role::Member);
    for i in 0..3 {
        h.service
            .create_post(&member, NewPost::question(format!("q{i}")))
            .await
            .unwrap();
    }

    let page = h
        .service
        .get_feed(&member, FeedPage::default())
        .await
        .unwrap();
    assert_eq!(page.posts.len(), 2);
    assert!(page.has_more);
    assert!(page.cursor.is_some());
}

#[tokio::test]
async fn test_out_of_range_cursor_is_a_validation_error() {
    use base64::{engine::general_purpose, Engine as _};

    let h = Harness::new();
    let member = h.user("member", Role::Member);
    h.service
        .create_post(&member, NewPost::question("anyone?"))
        .await
        .unwrap();

    let err = h
        .service
        .get_feed(
            &member,
            FeedPage {
                limit: Some(1),
                cursor: Some(general_purpose::STANDARD.encode(u64::MAX.to_string())),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { ref field, .. } if field == "cursor"));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_post_edit_normalizes_tags_like_create() {
    let h = Harness::new();
    let member = h.user("member", Role::Member);
    let mut draft = NewPost::question("Tagged");
    draft.tags = vec![" exams ".into(), "".into()];
    let post = h.service.create_post(&member, draft).await.unwrap();
    assert_eq!(post.tags, vec!["exams".to_string()]);

    let edited = h
        .service
        .edit_post(
            &member,
            post.id,
            PostEdit {
                body: None,
                tags: Some(vec!["  library ".into(), "   ".into(), "late".into()]),
                title: None,
                expected_version: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(edited.tags, vec!["library".to_string(), "late".to_string()]);
}

#[tokio::test]
async fn test_members_cannot_publish_announcements() {
    let h = Harness::new();
    let member = h.user("member", Role::Member);

    let err = h
        .service
        .create_post(&member, NewPost::announcement("Free pizza", "Now"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
}

#[tokio::test]
async fn test_reply_to_reply_is_rejected() {
    let h = Harness::new();
    let u = h.user("u", Role::Member);
    let post = h
        .service
        .create_post(&u, NewPost::question("Depth?"))
        .await
        .unwrap();
    let (_, comment) = h
        .service
        .add_child(&u, post.id, NodePath::Post, child("one"))
        .await
        .unwrap();
    let (_, reply) = h
        .service
        .add_child(&u, post.id, comment, child("two"))
        .await
        .unwrap();

    let err = h
        .service
        .add_child(&u, post.id, reply, child("three"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));
}

#[tokio::test]
async fn test_missing_nodes_are_not_found() {
    let h = Harness::new();
    let u = h.user("u", Role::Member);

    let err = h
        .service
        .toggle_like(&u, Uuid::new_v4(), NodePath::Post)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let post = h
        .service
        .create_post(&u, NewPost::question("Anyone?"))
        .await
        .unwrap();
    let err = h
        .service
        .add_child(
            &u,
            post.id,
            NodePath::Comment {
                comment_id: Uuid::new_v4(),
            },
            child("reply to nothing"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_stale_expected_version_conflicts() {
    let h = Harness::new();
    let u = h.user("u", Role::Member);
    let post = h
        .service
        .create_post(&u, NewPost::question("Version?"))
        .await
        .unwrap();
    let (_, comment) = h
        .service
        .add_child(&u, post.id, NodePath::Post, child("first"))
        .await
        .unwrap();

    let err = h
        .service
        .edit_child(
            &u,
            post.id,
            comment,
            ChildEdit {
                body: "second".into(),
                expected_version: Some(post.version),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_poll_votes_move_between_options() {
    let h = Harness::new();
    let club = h.user("club", Role::Organizer);
    let voter = h.user("voter", Role::Member);

    let mut poll = NewPost::announcement("Movie night", "Pick one");
    poll.poll_options = vec!["Comedy".into(), "Horror".into()];
    let post = h.service.create_post(&club, poll).await.unwrap();

    let view = h.service.vote_poll(&voter, post.id, 0).await.unwrap();
    assert_eq!(view.poll_options[0].vote_count, 1);

    let view = h.service.vote_poll(&voter, post.id, 1).await.unwrap();
    assert_eq!(view.poll_options[0].vote_count, 0);
    assert_eq!(view.poll_options[1].vote_count, 1);

    let err = h.service.vote_poll(&voter, post.id, 7).await.unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));

    let question = h
        .service
        .create_post(&voter, NewPost::question("Not a poll"))
        .await
        .unwrap();
    let err = h
        .service
        .vote_poll(&voter, question.id, 0)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));
}

#[tokio::test]
async fn test_authored_listings() {
    let h = Harness::new();
    let u1 = h.user("u1", Role::Member);
    let u2 = h.user("u2", Role::Member);

    let mine = h
        .service
        .create_post(&u1, NewPost::question("mine"))
        .await
        .unwrap();
    let theirs = h
        .service
        .create_post(&u2, NewPost::question("theirs"))
        .await
        .unwrap();
    let (_, comment) = h
        .service
        .add_child(&u2, mine.id, NodePath::Post, child("hello"))
        .await
        .unwrap();
    h.service
        .add_child(&u1, theirs.id, NodePath::Post, child("hi"))
        .await
        .unwrap();
    h.service
        .add_child(&u1, mine.id, comment, child("thanks"))
        .await
        .unwrap();

    let authored = h.service.list_authored_posts(&u1).await.unwrap();
    assert_eq!(authored.iter().map(|p| p.id).collect::<Vec<_>>(), vec![mine.id]);

    let mut replied: Vec<Uuid> = h
        .service
        .list_authored_children(&u1)
        .await
        .unwrap()
        .iter()
        .map(|p| p.id)
        .collect();
    replied.sort();
    let mut expected = vec![mine.id, theirs.id];
    expected.sort();
    assert_eq!(replied, expected);
}

#[tokio::test]
async fn test_profile_changes_show_through_on_render() {
    let h = Harness::new();
    let u = h.user("before", Role::Member);
    let post = h
        .service
        .create_post(&u, NewPost::question("Rename?"))
        .await
        .unwrap();
    assert_eq!(post.profile.display_name, "before");

    h.profiles.remove(&u.identity);
    let view = h.service.get_post(&u, post.id).await.unwrap();
    // Falls back to the snapshot captured at creation.
    assert_eq!(view.profile.display_name, "before");
    assert_eq!(view.profile.display_role, "Student");
}

#[tokio::test]
async fn test_mutations_publish_realtime_events() {
    let h = Harness::new();
    let mut events = h.hub.subscribe();
    let u = h.user("u", Role::Member);

    let post = h
        .service
        .create_post(&u, NewPost::question("Hello?"))
        .await
        .unwrap();
    h.service
        .toggle_like(&u, post.id, NodePath::Post)
        .await
        .unwrap();
    h.service.delete_post(&u, post.id, None).await.unwrap();

    let names: Vec<EventName> = (0..3)
        .map(|_| events.try_recv().unwrap().name)
        .collect();
    assert_eq!(
        names,
        vec![
            EventName::PostCreated,
            EventName::LikeToggled,
            EventName::PostDeleted
        ]
    );
}
