use camino::Utf8PathBuf;
use clap::builder::styling::AnsiColor;
use clap::builder::Styles;
use clap::{CommandFactory as _, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use tracing::level_filters::LevelFilter;

const MAIN_COLOR: AnsiColor = AnsiColor::Cyan;
const SECONDARY_COLOR: AnsiColor = AnsiColor::Yellow;
const HELP_STYLES: Styles = Styles::styled()
    .header(MAIN_COLOR.on_default().bold())
    .usage(MAIN_COLOR.on_default().bold())
    .placeholder(SECONDARY_COLOR.on_default())
    .literal(SECONDARY_COLOR.on_default());

/// kpt manages Kubernetes Resource Model packages stored in git and OCI
/// repositories: their lifecycle, rendering, and deployment.
#[derive(Parser, Debug)]
#[command(version, author, styles = HELP_STYLES)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,

    /// Path to the registered-repositories file.
    #[arg(long, global = true, env = "KPT_REPOSITORIES", default_value = "kpt-repositories.yaml")]
    pub repositories_file: Utf8PathBuf,

    /// Path to the orchestrator configuration file.
    #[arg(long, global = true, env = "KPT_CONFIG", default_value = "kpt-config.yaml")]
    pub config_file: Utf8PathBuf,

    /// Print source location and additional information in logs.
    ///
    /// `-v` adds verbosity, `-vv` sets the log level to DEBUG, `-vvv` to
    /// TRACE. To change the log level without verbosity, set `KPT_LOG`.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl CliArgs {
    pub fn verbosity(&self) -> anyhow::Result<Option<LevelFilter>> {
        let level = match self.verbose {
            0 => None,
            1 => Some(LevelFilter::INFO),
            2 => Some(LevelFilter::DEBUG),
            3 => Some(LevelFilter::TRACE),
            _ => anyhow::bail!("invalid verbosity level. Use -v, -vv, or -vvv."),
        };
        Ok(level)
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Manage registered repositories.
    Repo(RepoArgs),
    /// Create and edit Draft package revisions.
    Draft(DraftArgs),
    /// Move a package revision through the proposal/approval lifecycle.
    Revision(RevisionArgs),
    /// Run a Draft's declared render pipeline.
    Render(RenderArgs),
    /// Apply a Published revision's resources to a cluster.
    Apply(ApplyArgs),
    /// Discover functions published to an OCI repository.
    Function(FunctionArgs),
    /// One-shot legacy inventory migration.
    Inventory(InventoryArgs),
    /// Generate command autocompletions for various shells.
    #[command(alias = "generate-completions")]
    Completions(Completions),
    /// Write the JSON schema of the repositories file to .schema/latest.json
    #[command(alias = "schema")]
    GenerateSchema,
}

#[derive(Parser, Debug)]
pub struct RepoArgs {
    #[command(subcommand)]
    pub command: RepoCommand,
}

#[derive(Subcommand, Debug)]
pub enum RepoCommand {
    /// Register a repository.
    Add(RepoAdd),
    /// Deregister a repository.
    Remove(RepoRemove),
    /// List registered repositories.
    List,
}

#[derive(ValueEnum, Clone, Copy, Debug, Eq, PartialEq)]
pub enum RepoKind {
    Git,
    Oci,
}

#[derive(ValueEnum, Clone, Copy, Debug, Eq, PartialEq, Default)]
pub enum ContentKindArg {
    #[default]
    Package,
    Function,
}

#[derive(Parser, Debug)]
pub struct RepoAdd {
    /// Name this repository is registered under.
    pub name: String,
    #[arg(long, value_enum)]
    pub kind: RepoKind,
    #[arg(long, value_enum, default_value_t = ContentKindArg::Package)]
    pub content: ContentKindArg,
    /// Git clone URL. Required when `--kind git`.
    #[arg(long)]
    pub url: Option<String>,
    /// OCI registry host. Required when `--kind oci`.
    #[arg(long)]
    pub registry: Option<String>,
    /// OCI repository path. Required when `--kind oci`.
    #[arg(long)]
    pub repository: Option<String>,
    /// Mark this repository as a deployment target rather than a blueprint source.
    #[arg(long)]
    pub deployment: bool,
    #[arg(long, default_value = "")]
    pub description: String,
}

#[derive(Parser, Debug)]
pub struct RepoRemove {
    pub name: String,
}

#[derive(Parser, Debug)]
pub struct DraftArgs {
    #[command(subcommand)]
    pub command: DraftCommand,
}

#[derive(Subcommand, Debug)]
pub enum DraftCommand {
    /// Create an empty Draft.
    Init(DraftInit),
    /// Clone a Published revision into a new Draft.
    Clone(DraftClone),
    /// Replace a Draft's contents from a local directory.
    Update(DraftUpdate),
    /// Fetch a revision's contents into a local directory.
    Get(DraftGet),
}

#[derive(Parser, Debug)]
pub struct DraftInit {
    pub repository: String,
    pub package: String,
    pub workspace: String,
}

#[derive(Parser, Debug)]
pub struct DraftClone {
    #[arg(long = "source-repository")]
    pub source_repository: String,
    #[arg(long = "source-package")]
    pub source_package: String,
    #[arg(long = "source-workspace")]
    pub source_workspace: String,
    #[arg(long = "source-revision")]
    pub source_revision: String,
    #[arg(long = "target-repository")]
    pub target_repository: String,
    #[arg(long = "target-package")]
    pub target_package: String,
    #[arg(long = "target-workspace")]
    pub target_workspace: String,
}

#[derive(Parser, Debug)]
pub struct DraftUpdate {
    pub repository: String,
    pub package: String,
    pub workspace: String,
    /// Directory whose contents replace the Draft's file map.
    pub path: Utf8PathBuf,
}

#[derive(Parser, Debug)]
pub struct DraftGet {
    pub repository: String,
    pub package: String,
    pub workspace: String,
    #[arg(long)]
    pub revision: Option<String>,
    /// Directory to write the revision's files into.
    pub out: Utf8PathBuf,
}

#[derive(Parser, Debug)]
pub struct RevisionArgs {
    #[command(subcommand)]
    pub command: RevisionCommand,
}

#[derive(Subcommand, Debug)]
pub enum RevisionCommand {
    /// List every revision in a repository.
    List(RevisionList),
    Propose(RevisionRef),
    Reject(RevisionRef),
    #[command(name = "propose-delete")]
    ProposeDelete(RevisionRef),
    #[command(name = "reject-delete")]
    RejectDelete(RevisionRef),
    Approve(RevisionRef),
    #[command(name = "approve-delete")]
    ApproveDelete(RevisionRef),
}

#[derive(Parser, Debug)]
pub struct RevisionList {
    pub repository: String,
}

#[derive(Parser, Debug)]
pub struct RevisionRef {
    pub repository: String,
    pub package: String,
    pub workspace: String,
    /// Published revision, e.g. `v1`. Omit for a Draft or Proposed revision.
    #[arg(long)]
    pub revision: Option<String>,
}

#[derive(Parser, Debug)]
pub struct RenderArgs {
    pub repository: String,
    pub package: String,
    pub workspace: String,
    #[arg(long)]
    pub revision: Option<String>,
    /// Connect to the local Docker daemon to run image-backed functions.
    #[arg(long)]
    pub docker: bool,
}

#[derive(Parser, Debug)]
pub struct ApplyArgs {
    pub repository: String,
    pub package: String,
    pub workspace: String,
    #[arg(long)]
    pub revision: Option<String>,
    #[arg(long = "inventory-namespace")]
    pub inventory_namespace: String,
    #[arg(long = "inventory-name")]
    pub inventory_name: String,
}

#[derive(Parser, Debug)]
pub struct FunctionArgs {
    #[command(subcommand)]
    pub command: FunctionCommand,
}

#[derive(Subcommand, Debug)]
pub enum FunctionCommand {
    /// Discover functions published to an OCI repository.
    Discover(FunctionDiscover),
}

#[derive(Parser, Debug)]
pub struct FunctionDiscover {
    pub registry: String,
    pub repository: String,
    #[arg(long)]
    pub username: Option<String>,
    #[arg(long)]
    pub password: Option<String>,
    /// Only show functions tagged with this keyword.
    #[arg(long)]
    pub keyword: Option<String>,
}

#[derive(Parser, Debug)]
pub struct InventoryArgs {
    #[command(subcommand)]
    pub command: InventoryCommand,
}

#[derive(Subcommand, Debug)]
pub enum InventoryCommand {
    /// Migrate a legacy ConfigMap-based inventory into a ResourceGroup.
    Migrate(InventoryMigrate),
}

#[derive(Parser, Debug)]
pub struct InventoryMigrate {
    pub namespace: String,
    pub name: String,
    /// Local package directory holding the legacy `inventory-template.yaml`.
    pub local_path: Utf8PathBuf,
}

#[derive(Parser, Debug)]
pub struct Completions {
    #[arg(default_value = "bash")]
    shell: Shell,
}

impl Completions {
    pub fn run(&self) {
        clap_complete::generate(self.shell, &mut CliArgs::command(), "kpt", &mut std::io::stdout());
    }
}
