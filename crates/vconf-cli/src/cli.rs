use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "vconf",
    about = "vconf: inspect and drive variant configuration repositories",
    version
)]
pub struct Cli {
    /// Repository description (TOML for `.toml`, JSON otherwise)
    #[arg(long, global = true, default_value = "vconf.toml")]
    pub models: String,

    /// Snapshot file restored on load and rewritten by `set`/`unset`
    #[arg(long, global = true)]
    pub snapshot: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List every record of every registry
    Dump {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show one record
    Get {
        /// Record address (`registry:path`)
        address: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Set a parameter value from its text form
    Set {
        /// Parameter address (`registry:path`)
        address: String,

        /// Value text (strings may be bare or double-quoted)
        value: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Drop a parameter's explicit value
    Unset {
        /// Parameter address (`registry:path`)
        address: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the repository snapshot text
    Snapshot {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List records matched by a selector such as `geo:setup/layer[0;3)`
    Select {
        selector: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Parse an address and print its canonical form
    Address {
        text: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that a dependency can be registered on the loaded repository
    Depend {
        /// Depending record or value group (`registry:path@group`)
        depender: String,

        /// Record that must be active (`registry:path`)
        dependee: String,

        /// Combine the depender's dependees with this logic, e.g. `or([0], [1])`
        #[arg(long)]
        logic: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
