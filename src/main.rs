use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use jobdesk::config::Config;
use jobdesk::entities::{ApplicationStatus, JobStatus, ListScope};
use jobdesk::gateway::HttpGateway;
use jobdesk::{logging, Console};

#[derive(Parser, Debug)]
#[command(name = "jobdesk")]
#[command(about = "Admin console for a job-board API")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/jobdesk/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Job postings
  #[command(subcommand)]
  Jobs(JobsCommand),
  /// States and provinces
  #[command(subcommand)]
  States(StatesCommand),
  /// Countries
  #[command(subcommand)]
  Countries(CountriesCommand),
  /// Applications to jobs
  #[command(subcommand)]
  Applications(ApplicationsCommand),
}

#[derive(Subcommand, Debug)]
enum JobsCommand {
  List {
    #[arg(short, long, default_value_t = 1)]
    page: usize,
  },
  Show {
    id: String,
  },
  /// Set the status of a job (DRAFT, PUBLISHED, CLOSED, ARCHIVED)
  Status {
    id: String,
    status: JobStatus,
  },
  Delete {
    id: String,
  },
}

#[derive(Subcommand, Debug)]
enum StatesCommand {
  List {
    /// Only states of this country
    #[arg(long)]
    country: Option<String>,
  },
}

#[derive(Subcommand, Debug)]
enum CountriesCommand {
  List,
}

#[derive(Subcommand, Debug)]
enum ApplicationsCommand {
  /// Applications to one job
  List {
    job_id: String,
  },
  /// Set the status of an application (PENDING, REVIEWING, SHORTLISTED, REJECTED, HIRED)
  Status {
    id: String,
    status: ApplicationStatus,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  let config = Config::load(args.config.as_deref())?;
  let _guard = logging::init(&config.logging)?;

  let gateway = HttpGateway::new(&config.api)?;
  let console = Console::new(Arc::new(gateway), &config.cache, config.pagination.per_page);

  run(&console, args.command).await
}

async fn run(console: &Console, command: Command) -> Result<()> {
  match command {
    Command::Jobs(JobsCommand::List { page }) => {
      let page = console.jobs.page(ListScope::All, page).await?;
      for job in &page.items {
        println!("{:>6}  {:<10}  {}", job.id, job.status, job.title);
      }
      println!(
        "page {}/{} ({} jobs)",
        page.page,
        page.page_count().max(1),
        page.total
      );
    }
    Command::Jobs(JobsCommand::Show { id }) => {
      let job = console.jobs.get_by_id(&id).await?;
      println!("{} [{}]", job.title, job.status);
      if let Some(company) = &job.company {
        println!("Company: {}", company.name);
      }
      if let Some(kind) = &job.employment_type {
        println!("Type: {}", kind);
      }
      if let Some(description) = &job.description {
        println!("\n{}", description);
      }
    }
    Command::Jobs(JobsCommand::Status { id, status }) => {
      let job = console.jobs.set_status(&id, &status).await?;
      println!("Job {} is now {}", job.id, job.status);
    }
    Command::Jobs(JobsCommand::Delete { id }) => {
      console.jobs.delete(&id).await?;
      println!("Deleted job {}", id);
    }
    Command::States(StatesCommand::List { country }) => {
      let scope = country.map(ListScope::Country).unwrap_or(ListScope::All);
      let states = console.states.list(scope).await?;
      for state in &states.items {
        println!(
          "{:>6}  {:<6}  {}",
          state.id,
          state.code.as_deref().unwrap_or("-"),
          state.name
        );
      }
    }
    Command::Countries(CountriesCommand::List) => {
      let countries = console.countries.list(ListScope::All).await?;
      for country in &countries.items {
        println!(
          "{:>6}  {:<4}  {}",
          country.id,
          country.iso_code.as_deref().unwrap_or("-"),
          country.name
        );
      }
    }
    Command::Applications(ApplicationsCommand::List { job_id }) => {
      let applications = console.applications.list(ListScope::Job(job_id)).await?;
      for application in &applications.items {
        println!(
          "{:>6}  {:<12}  {} <{}>",
          application.id, application.status, application.applicant_name, application.email
        );
      }
      println!("{} applications", applications.total);
    }
    Command::Applications(ApplicationsCommand::Status { id, status }) => {
      let application = console.applications.set_status(&id, &status).await?;
      println!("Application {} is now {}", application.id, application.status);
    }
  }

  Ok(())
}
