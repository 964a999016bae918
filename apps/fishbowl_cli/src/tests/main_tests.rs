use clap::CommandFactory;
use fishbowl_api::FrontEndConfig;
use shared::{domain::Settings, protocol::SubjectEntry};

use super::*;

fn context(dir: &tempfile::TempDir) -> ApiContext {
    let store = SubjectStore::open(dir.path().join("db.json")).expect("store");
    ApiContext::new(
        store,
        FrontEndConfig {
            admins: [UserId::new("boss")].into_iter().collect(),
            channel: "C0FISHBOWL".into(),
            meet_url: "https://meet.example/m".into(),
            presentation_url: "https://slides.example/s".into(),
        },
    )
}

#[test]
fn cli_definition_is_valid() {
    Cli::command().debug_assert();
}

#[test]
fn identity_is_accepted_on_either_side_of_the_subcommand() {
    let before = Cli::try_parse_from(["fishbowl", "--as", "alice", "vote", "3"]).expect("before");
    assert_eq!(before.user.as_deref(), Some("alice"));
    assert!(matches!(before.command, Command::Vote { id: 3 }));

    let after = Cli::try_parse_from(["fishbowl", "list", "--as", "bob"]).expect("after");
    assert_eq!(after.user.as_deref(), Some("bob"));
    assert!(matches!(after.command, Command::List));
}

#[test]
fn missing_identity_parses_as_none() {
    let cli = Cli::try_parse_from(["fishbowl", "history"]).expect("parse");
    assert!(cli.user.is_none());
}

#[test]
fn home_rendering_marks_votes_and_history() {
    let view = HomeView {
        is_admin: false,
        queue: QueueKind::Active,
        settings: Settings::default(),
        subjects: vec![
            SubjectEntry {
                id: SubjectId(1),
                text: "Macros".into(),
                votes: Some(2),
                voted: true,
                can_delete: false,
                can_choose: false,
            },
            SubjectEntry {
                id: SubjectId(2),
                text: "Unsafe".into(),
                votes: None,
                voted: false,
                can_delete: true,
                can_choose: false,
            },
        ],
        past_subjects: vec!["Borrowck".into()],
        votes_left: 2,
    };

    assert_eq!(
        render_home(&view),
        "Subjects (2 votes left)\n  #1 [2] Macros *\n  #2 Unsafe\nPast subjects\n  • Borrowck"
    );
}

#[test]
fn empty_article_queue_says_so() {
    let view = HomeView {
        is_admin: true,
        queue: QueueKind::Article,
        settings: Settings {
            show_votes: false,
            show_articles: true,
        },
        subjects: Vec::new(),
        past_subjects: Vec::new(),
        votes_left: 3,
    };

    assert_eq!(render_home(&view), "Articles (3 votes left)\n  (nothing queued)");
}

#[tokio::test]
async fn commands_drive_the_store_end_to_end() {
    let dir = tempfile::tempdir().expect("tempdir");
    let ctx = context(&dir);
    let alice = UserId::new("alice");
    let boss = UserId::new("boss");

    let added = run(
        &ctx,
        &alice,
        Command::Add {
            text: vec!["Error".into(), "handling".into()],
        },
    )
    .await
    .expect("add");
    assert_eq!(added, "added subject #1");

    let voted = run(&ctx, &alice, Command::Vote { id: 1 }).await.expect("vote");
    assert_eq!(voted, "voted for #1");

    let listed = run(&ctx, &alice, Command::List).await.expect("list");
    assert!(listed.contains("#1 Error handling *"));

    let refused = run(&ctx, &alice, Command::Choose { id: 1 }).await;
    assert!(refused.is_err());

    let chosen = run(&ctx, &boss, Command::Choose { id: 1 }).await.expect("choose");
    assert!(chosen.starts_with("to C0FISHBOWL:\n"));
    assert!(chosen.contains("*Error handling*"));

    let again = run(&ctx, &boss, Command::Choose { id: 1 }).await.expect("choose again");
    assert_eq!(again, "subject #1 was already removed");

    let history = run(&ctx, &alice, Command::History).await.expect("history");
    assert_eq!(history, "  • Error handling");
}

#[tokio::test]
async fn show_articles_switches_queue_heading() {
    let dir = tempfile::tempdir().expect("tempdir");
    let ctx = context(&dir);
    let boss = UserId::new("boss");

    let switched = run(&ctx, &boss, Command::ShowArticles { state: Switch::On })
        .await
        .expect("switch");
    assert_eq!(switched, "collecting articles");

    let listed = run(&ctx, &boss, Command::List).await.expect("list");
    assert!(listed.starts_with("Articles"));

    let shown = run(&ctx, &boss, Command::ShowVotes).await.expect("toggle");
    assert_eq!(shown, "vote counts shown");
}
