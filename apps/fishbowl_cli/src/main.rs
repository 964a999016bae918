use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use fishbowl_api::ApiContext;
use shared::{
    domain::{QueueKind, SubjectId, UserId},
    protocol::{Announcement, HomeView, VoteToggle},
};
use storage::SubjectStore;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;

use config::load_settings;

#[derive(Parser, Debug)]
#[command(name = "fishbowl", about = "Queue, vote on and pick fishbowl discussion subjects")]
struct Cli {
    #[arg(long, default_value = "fishbowl.toml")]
    config: PathBuf,
    /// Overrides the store file from the config file and environment.
    #[arg(long)]
    data: Option<PathBuf>,
    /// Identity the command runs as. Accepted before or after the subcommand.
    #[arg(long = "as", value_name = "USER", global = true)]
    user: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the pending subjects of the selected queue.
    List,
    Add {
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    Delete {
        id: u64,
    },
    Choose {
        id: u64,
    },
    /// Vote for a subject, or withdraw an existing vote.
    Vote {
        id: u64,
    },
    ResetVotes,
    /// Flip whether everyone sees vote counts.
    ShowVotes,
    ShowArticles {
        state: Switch,
    },
    History,
    SendTopics,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Switch {
    On,
    Off,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let user = UserId::new(cli.user.context("--as <USER> is required")?);
    let mut settings = load_settings(&cli.config)?;
    if let Some(data) = cli.data {
        settings.data_path = data;
    }

    let store = SubjectStore::open(&settings.data_path).with_context(|| {
        format!(
            "failed to open subject store '{}'",
            settings.data_path.display()
        )
    })?;
    info!(path = %settings.data_path.display(), admins = settings.admins.len(), "store ready");

    let ctx = ApiContext::new(store, settings.front_end());
    let output = run(&ctx, &user, cli.command).await?;
    println!("{output}");
    Ok(())
}

async fn run(ctx: &ApiContext, user: &UserId, command: Command) -> Result<String> {
    let output = match command {
        Command::List => render_home(&fishbowl_api::home_view(ctx, user).await),
        Command::Add { text } => {
            let subject = fishbowl_api::submit_subject(ctx, user, &text.join(" ")).await?;
            format!("added subject #{}", subject.id)
        }
        Command::Delete { id } => {
            if fishbowl_api::delete_subject(ctx, user, SubjectId(id)).await? {
                format!("deleted subject #{id}")
            } else {
                format!("subject #{id} was already gone")
            }
        }
        Command::Choose { id } => match fishbowl_api::choose_subject(ctx, user, SubjectId(id)).await? {
            Some(announcement) => render_announcement(&announcement),
            None => format!("subject #{id} was already removed"),
        },
        Command::Vote { id } => match fishbowl_api::switch_vote(ctx, user, SubjectId(id)).await? {
            VoteToggle::Voted => format!("voted for #{id}"),
            VoteToggle::Unvoted => format!("withdrew vote for #{id}"),
            VoteToggle::QuotaExceeded => format!(
                "you already have {} votes; withdraw one first",
                storage::MAX_VOTES_PER_USER
            ),
        },
        Command::ResetVotes => {
            fishbowl_api::reset_votes(ctx, user).await?;
            "all votes cleared".to_string()
        }
        Command::ShowVotes => {
            let shown = fishbowl_api::toggle_show_votes(ctx, user).await?;
            format!("vote counts {}", if shown { "shown" } else { "hidden" })
        }
        Command::ShowArticles { state } => {
            let show = matches!(state, Switch::On);
            fishbowl_api::set_show_articles(ctx, user, show).await?;
            format!("collecting {}", if show { "articles" } else { "subjects" })
        }
        Command::History => render_bullets(&fishbowl_api::past_subjects(ctx).await),
        Command::SendTopics => render_announcement(&fishbowl_api::send_topics(ctx, user).await?),
    };
    Ok(output)
}

fn render_home(view: &HomeView) -> String {
    let heading = match view.queue {
        QueueKind::Active => "Subjects",
        QueueKind::Article => "Articles",
    };
    let mut out = format!("{heading} ({} votes left)\n", view.votes_left);
    if view.subjects.is_empty() {
        out.push_str("  (nothing queued)\n");
    }
    for entry in &view.subjects {
        let votes = entry
            .votes
            .map(|votes| format!("[{votes}] "))
            .unwrap_or_default();
        let mark = if entry.voted { " *" } else { "" };
        out.push_str(&format!("  #{} {votes}{}{mark}\n", entry.id, entry.text));
    }
    if !view.past_subjects.is_empty() {
        out.push_str("Past subjects\n");
        out.push_str(&render_bullets(&view.past_subjects));
    }
    out.trim_end().to_string()
}

fn render_bullets(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("  • {item}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_announcement(announcement: &Announcement) -> String {
    format!("to {}:\n{}", announcement.channel, announcement.text)
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
