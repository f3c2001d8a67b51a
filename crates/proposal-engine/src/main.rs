use anyhow::{bail, Context};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use proposal_core::{DepartmentId, ProposalVersion};
use proposal_engine::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Command::new("proposal-engine")
        .version(proposal_engine::VERSION)
        .about("Proposal lifecycle engine: schema setup, demo scenario and inspection")
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("init")
                .about("Create or migrate a SQLite database")
                .arg(db_arg().required(true)),
        )
        .subcommand(
            Command::new("scenario")
                .about("Run the draft → revise → approve walkthrough")
                .arg(db_arg().help("SQLite database (in-memory when omitted)"))
                .arg(
                    Arg::new("config")
                        .long("config")
                        .value_parser(value_parser!(PathBuf))
                        .help("Engine configuration (TOML)"),
                ),
        )
        .subcommand(
            Command::new("versions")
                .about("List the versions of a proposal")
                .arg(db_arg().required(true))
                .arg(
                    Arg::new("proposal")
                        .long("proposal")
                        .required(true)
                        .help("Proposal id"),
                )
                .arg(json_arg()),
        )
        .subcommand(
            Command::new("proposals")
                .about("List proposals")
                .arg(db_arg().required(true))
                .arg(
                    Arg::new("status")
                        .long("status")
                        .help("Only proposals in this status"),
                )
                .arg(
                    Arg::new("all")
                        .long("all")
                        .action(ArgAction::SetTrue)
                        .help("Include archived proposals"),
                )
                .arg(json_arg()),
        );

    let matches = cli.get_matches();
    init_tracing(matches.get_flag("log-json"));

    match matches.subcommand() {
        Some(("init", args)) => {
            let path = db_path(args)?;
            SqliteStore::open(&path).with_context(|| format!("opening {}", path.display()))?;
            println!("Schema ready at {}", path.display());
        }
        Some(("scenario", args)) => {
            let config = match args.get_one::<PathBuf>("config") {
                Some(path) => EngineConfig::from_file(path)?,
                None => EngineConfig::default(),
            };
            match args.get_one::<PathBuf>("db") {
                Some(path) => run_scenario(Arc::new(SqliteStore::open(path)?), config).await?,
                None => run_scenario(Arc::new(InMemoryStore::new()), config).await?,
            }
        }
        Some(("versions", args)) => {
            let service = inspector(&db_path(args)?)?;
            let proposal_id: ProposalId = args
                .get_one::<String>("proposal")
                .context("missing --proposal")?
                .parse()
                .context("invalid proposal id")?;
            let versions = service.list_versions(proposal_id, &admin()).await?;
            if args.get_flag("json") {
                println!("{}", serde_json::to_string_pretty(&versions)?);
            } else {
                for version in &versions {
                    print_version(version);
                }
            }
        }
        Some(("proposals", args)) => {
            let service = inspector(&db_path(args)?)?;
            let mut filter = ProposalFilter::new();
            if let Some(raw) = args.get_one::<String>("status") {
                filter = filter.with_status(raw.parse::<ProposalStatus>()?);
            }
            if args.get_flag("all") {
                filter = filter.including_archived();
            }
            let proposals = service.list_proposals(&admin(), filter).await?;
            if args.get_flag("json") {
                println!("{}", serde_json::to_string_pretty(&proposals)?);
            } else {
                for proposal in &proposals {
                    let team = proposal
                        .team_id
                        .map_or_else(|| "-".to_string(), |t| t.to_string());
                    let archived = if proposal.is_archived() { " (archived)" } else { "" };
                    println!("{}  team {team}  {}{archived}", proposal.id, proposal.status);
                }
            }
        }
        _ => unreachable!("subcommand_required"),
    }
    Ok(())
}

fn db_arg() -> Arg {
    Arg::new("db")
        .long("db")
        .value_parser(value_parser!(PathBuf))
        .help("SQLite database file")
}

fn json_arg() -> Arg {
    Arg::new("json")
        .long("json")
        .action(ArgAction::SetTrue)
        .help("Output as JSON")
}

fn db_path(args: &ArgMatches) -> anyhow::Result<PathBuf> {
    args.get_one::<PathBuf>("db")
        .cloned()
        .context("missing --db")
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn admin() -> Actor {
    Actor::new(1, Role::Admin)
}

/// Read-only service over a database; collaborators are empty stand-ins
fn inspector(path: &Path) -> anyhow::Result<LifecycleService<SqliteStore>> {
    let store = SqliteStore::open(path).with_context(|| format!("opening {}", path.display()))?;
    Ok(LifecycleService::new(
        Arc::new(store),
        Collaborators::new(
            Arc::new(StaticTeamDirectory::new()),
            Arc::new(InMemoryFileStore::new()),
            Arc::new(RecordingAuditSink::new()),
            Arc::new(RecordingNotifier::new()),
        ),
        EngineConfig::default(),
    ))
}

fn print_version(version: &ProposalVersion) {
    let mut flags = Vec::new();
    if version.is_locked() {
        flags.push("locked");
    }
    if version.is_approved {
        flags.push("approved");
    }
    println!(
        "v{}  {}  {}  [{}]",
        version.version_number,
        version.created_at.format("%Y-%m-%d %H:%M:%S"),
        version.content.title,
        flags.join(", ")
    );
}

async fn run_scenario<S: Datastore>(store: Arc<S>, config: EngineConfig) -> anyhow::Result<()> {
    let team = TeamId(7);
    let teams = Arc::new(StaticTeamDirectory::new());
    teams.insert(TeamInfo {
        team_id: team,
        leader_id: UserId(100),
        is_finalized: false,
        member_ids: vec![UserId(101), UserId(102)],
        department_id: Some(DepartmentId(4)),
    });
    let audit = Arc::new(RecordingAuditSink::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let collaborators = Collaborators::new(
        teams.clone(),
        Arc::new(InMemoryFileStore::new()),
        audit.clone(),
        notifier.clone(),
    )
    .with_advisory(Arc::new(CompletenessAnalyzer));
    let service = LifecycleService::new(store, collaborators, config);

    let leader = Actor::new(100, Role::Student);
    let reviewer = Actor::new(200, Role::Supervisor).in_department(4);
    let head = Actor::new(300, Role::DepartmentHead).in_department(4);

    println!("Running proposal lifecycle scenario...");
    let attachment = service
        .store_attachment(&leader, "budget.csv", b"item,cost\npanels,1200\npump,300\n")
        .await?;
    let content = ProposalContent::new(
        "Solar-powered drip irrigation",
        "Smallholder farms lose most irrigation water to evaporation",
    )
    .with_objectives("Cut water use by half on three pilot farms")
    .with_methodology("Install sensor-driven drip lines and compare against flood irrigation")
    .with_expected_outcomes("Measured savings and a cost model for wider rollout")
    .with_attachment(attachment);

    let (proposal, v1) = service.create_draft(&leader, team, content.clone()).await?;
    println!("Draft {} created with version {}", proposal.id, v1.version_number);

    service
        .assign_reviewer(proposal.id, &head, reviewer.user_id)
        .await?;
    println!("Reviewer {} assigned", reviewer.user_id);

    match service.submit(proposal.id, &leader, team).await {
        Err(e @ LifecycleError::Precondition(_)) => println!("Submission refused: {e}"),
        Err(e) => return Err(e.into()),
        Ok(_) => bail!("submission must fail while the team is not finalized"),
    }

    teams.finalize(team);
    let submitted = service.submit(proposal.id, &leader, team).await?;
    println!("Team finalized; status is now {}", submitted.status);

    service
        .record_decision(
            &reviewer,
            proposal.id,
            v1.id,
            DecisionKind::Revise,
            "Timeline is missing; please add milestones",
        )
        .await?;
    let view = service.get_proposal(proposal.id, &leader).await?;
    println!("Reviewer asked for revision; status is {}", view.proposal.status);

    let v2 = service
        .update_content(
            proposal.id,
            &leader,
            content.with_timeline("Install in month 1, measure months 2-6, report in month 7"),
        )
        .await?;
    println!("Revision appended as version {}", v2.version_number);

    let resubmitted = service.submit(proposal.id, &leader, team).await?;
    println!("Re-submitted; status is {}", resubmitted.status);

    service
        .record_decision(
            &reviewer,
            proposal.id,
            v2.id,
            DecisionKind::Approve,
            "Feasible scope with clear milestones",
        )
        .await?;
    let view = service.get_proposal(proposal.id, &leader).await?;
    let project = service.get_project(proposal.id, &leader).await?;
    println!(
        "Approved; project {} \"{}\" ({} visibility)",
        project.id,
        project.title,
        project.visibility.as_str()
    );
    if let Some(advisory) = &view.advisory {
        println!("Advisory score {:.2}", advisory.score);
    }

    println!();
    println!("Versions:");
    for version in service.list_versions(proposal.id, &leader).await? {
        print_version(&version);
    }
    println!();
    println!(
        "{} audit entries, {} notifications",
        audit.entries().len(),
        notifier.sent().len()
    );
    Ok(())
}
