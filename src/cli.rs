use clap::{Parser, Subcommand, ValueEnum};

/// SkillSwap: peer-to-peer skill exchange service
#[derive(Parser)]
#[command(name = "skillswap", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to bind (defaults to SKILLSWAP_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Apply database migrations and exit
    Migrate,

    /// Inspect swap requests
    Requests {
        #[command(subcommand)]
        command: RequestCommands,
    },

    /// Inspect notifications
    Notifications {
        #[command(subcommand)]
        command: NotificationCommands,
    },

    /// Run the cleanup job once and exit
    Cleanup,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum RequestDirection {
    Sent,
    Received,
    All,
}

#[derive(Subcommand)]
pub enum RequestCommands {
    /// List a user's swap requests
    List {
        #[arg(long)]
        user: String,
        #[arg(long, value_enum, default_value = "all")]
        direction: RequestDirection,
    },
    /// Show one swap request as JSON
    Show {
        #[arg(long)]
        id: String,
    },
}

#[derive(Subcommand)]
pub enum NotificationCommands {
    /// List a user's notifications, newest first
    List {
        #[arg(long)]
        user: String,
        #[arg(long, default_value = "50")]
        limit: usize,
    },
    /// Print a user's unread notification count
    Unread {
        #[arg(long)]
        user: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_requests_list() {
        let cli = Cli::try_parse_from([
            "skillswap",
            "requests",
            "list",
            "--user",
            "00000000-0000-0000-0000-000000000001",
            "--direction",
            "sent",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Requests {
                command: RequestCommands::List {
                    direction: RequestDirection::Sent,
                    ..
                }
            })
        ));
    }

    #[test]
    fn test_no_subcommand_is_allowed() {
        let cli = Cli::try_parse_from(["skillswap"]).unwrap();
        assert!(cli.command.is_none());
    }
}
