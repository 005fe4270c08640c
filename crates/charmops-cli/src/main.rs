//! charmops: release-engineering automation for multi-charm bundles.
//!
//! Thin command-line layer over `charmops-core`.

use std::time::Duration;

use charmops_cli::commands;
use charmops_core::charm_paths::DEFAULT_CHARMS_SUBDIR;
use charmops_core::dispatch::dispatcher::DEFAULT_REF;
use charmops_core::github::DEFAULT_PAT_ENV;
use charmops_core::release::{DEFAULT_PROMOTE_MANIFEST, DEFAULT_RELEASE_MANIFEST};
use charmops_core::GithubOutput;
use clap::{ArgAction, Parser, Subcommand};

const DEFAULT_LOG_FILTER: &str = "charmops_core=info,charmops_cli=info";
const HTTP_DEBUG_DIRECTIVES: [&str; 2] = ["charmops_core::github=trace", "reqwest=debug"];

/// charmops: release tooling for multi-charm bundles
#[derive(Parser)]
#[command(name = "charmops", version, about = "Release-engineering automation for multi-charm bundles")]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a workflow dispatch manifest, waiting on each run in turn.
    ///
    /// The manifest is a YAML list of {repository, workflow_name, inputs}
    /// entries. Each dispatch runs after the previous one finished.
    Dispatch {
        /// Path to the dispatch manifest YAML file
        manifest: String,
        /// Only log what would be dispatched
        #[arg(long, default_value_t = true, action = ArgAction::Set)]
        dry_run: bool,
        /// Log every GitHub API request and response
        #[arg(long)]
        github_debug_logging: bool,
        /// Environment variable holding the GitHub token
        #[arg(long, default_value = DEFAULT_PAT_ENV)]
        github_pat_environment_variable: String,
        /// GitHub API base URL (for GitHub Enterprise)
        #[arg(long, env = "GITHUB_API_URL")]
        github_api_url: Option<String>,
        /// Git ref the workflows run on
        #[arg(long = "ref", default_value = DEFAULT_REF)]
        git_ref: String,
        /// Seconds to wait for each run to be found and to complete
        #[arg(long, default_value_t = 60)]
        timeout_secs: u64,
        /// Seconds between polls
        #[arg(long, default_value_t = 1)]
        poll_interval_secs: u64,
    },

    /// Create a release dispatch manifest from a source and destination bundle
    ReleaseManifest {
        /// Bundle describing the channels charms are released from
        source_bundle: String,
        /// Bundle describing the channels charms are released to
        destination_bundle: String,
        /// Output YAML file
        #[arg(long, default_value = DEFAULT_RELEASE_MANIFEST)]
        output_file: String,
    },

    /// Create a promotion manifest from a source and destination bundle
    PromoteManifest {
        source_bundle: String,
        destination_bundle: String,
        /// Output YAML file
        #[arg(default_value = DEFAULT_PROMOTE_MANIFEST)]
        output_file: String,
    },

    /// Promote every application of a promotion manifest with charmcraft
    Promote {
        /// Promotion manifest YAML file
        #[arg(default_value = DEFAULT_PROMOTE_MANIFEST)]
        manifest: String,
        /// Only list what would be promoted
        #[arg(long, default_value_t = true, action = ArgAction::Set)]
        dry_run: bool,
    },

    /// Create a `track/<version>` branch in each charm repository of a bundle
    CreateBranches {
        /// Bundle whose channels name the tracks
        bundle: String,
        /// Only list the branches that would be created
        #[arg(long, default_value_t = true, action = ArgAction::Set)]
        dry_run: bool,
        /// Log every GitHub API request and response
        #[arg(long)]
        github_debug_logging: bool,
        /// Environment variable holding the GitHub token
        #[arg(long, default_value = DEFAULT_PAT_ENV)]
        github_pat_environment_variable: String,
        /// GitHub API base URL (for GitHub Enterprise)
        #[arg(long, env = "GITHUB_API_URL")]
        github_api_url: Option<String>,
    },

    /// List the bundle's charm tracks that do not exist on Charmhub
    MissingTracks {
        /// Path to the bundle file
        bundle: String,
    },

    /// Show how two bundles differ, ignoring key and list order
    BundleDiff {
        left: String,
        right: String,
    },

    /// Find charm directories and emit them as the `charm_paths` step output
    CharmPaths {
        /// Directory to search for charms
        base_dir: String,
        /// Subdirectory holding nested charms
        #[arg(long, default_value = DEFAULT_CHARMS_SUBDIR)]
        charms_subdir: String,
    },

    /// Generate contributing.md from the template and compare it with the charm's copy
    Contributing {
        /// Directory holding contributing.md.template; the result is written here
        template_dir: String,
        /// Charm directory holding contributing_inputs.yaml
        charm_dir: String,
    },

    /// Summarise Trivy JSON reports as CSV
    ScanSummary {
        /// Report file or directory of reports
        #[arg(long)]
        report_path: String,
        /// Print a CSV header line first
        #[arg(long)]
        header: bool,
    },
}

/// `RUST_LOG` (or the default filter), plus the HTTP directives when asked for.
fn log_filter(env_filter: Option<&str>, http_debug: bool) -> tracing_subscriber::EnvFilter {
    let mut filter = tracing_subscriber::EnvFilter::new(env_filter.unwrap_or(DEFAULT_LOG_FILTER));
    if http_debug {
        for directive in HTTP_DEBUG_DIRECTIVES {
            if let Ok(directive) = directive.parse::<tracing_subscriber::filter::Directive>() {
                filter = filter.add_directive(directive);
            }
        }
    }
    filter
}

fn init_tracing(http_debug: bool) {
    let env_filter = std::env::var(tracing_subscriber::EnvFilter::DEFAULT_ENV).ok();
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(env_filter.as_deref(), http_debug))
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let http_debug = matches!(
        cli.command,
        Commands::Dispatch {
            github_debug_logging: true,
            ..
        } | Commands::CreateBranches {
            github_debug_logging: true,
            ..
        }
    );
    init_tracing(http_debug);

    let result = match cli.command {
        Commands::Dispatch {
            manifest,
            dry_run,
            github_debug_logging: _,
            github_pat_environment_variable,
            github_api_url,
            git_ref,
            timeout_secs,
            poll_interval_secs,
        } => {
            let args = commands::dispatch::DispatchArgs {
                manifest,
                dry_run,
                pat_env_var: github_pat_environment_variable,
                api_url: github_api_url,
                git_ref,
                timeout: Duration::from_secs(timeout_secs),
                poll_interval: Duration::from_secs(poll_interval_secs),
            };
            commands::dispatch::run(&args).await
        }

        Commands::ReleaseManifest {
            source_bundle,
            destination_bundle,
            output_file,
        } => commands::release::run(&source_bundle, &destination_bundle, &output_file),

        Commands::PromoteManifest {
            source_bundle,
            destination_bundle,
            output_file,
        } => commands::promote::run(&source_bundle, &destination_bundle, &output_file),

        Commands::Promote { manifest, dry_run } => commands::promote::promote(&manifest, dry_run).await,

        Commands::CreateBranches {
            bundle,
            dry_run,
            github_debug_logging: _,
            github_pat_environment_variable,
            github_api_url,
        } => {
            let args = commands::branches::BranchArgs {
                bundle,
                dry_run,
                pat_env_var: github_pat_environment_variable,
                api_url: github_api_url,
            };
            commands::branches::run(&args).await
        }

        Commands::MissingTracks { bundle } => commands::tracks::run(&bundle).await,

        Commands::BundleDiff { left, right } => commands::bundle_diff::run(&left, &right).and_then(|same| {
            if same {
                Ok(())
            } else {
                Err("bundles differ".to_string())
            }
        }),

        Commands::CharmPaths {
            base_dir,
            charms_subdir,
        } => commands::charm_paths::run(&base_dir, &charms_subdir, &GithubOutput::from_env()).map(|_| ()),

        Commands::Contributing {
            template_dir,
            charm_dir,
        } => commands::contributing::run(&template_dir, &charm_dir, &GithubOutput::from_env()).map(|_| ()),

        Commands::ScanSummary {
            report_path,
            header,
        } => commands::scan::run(&report_path, header),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
