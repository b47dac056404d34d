use anyhow::{Context, Error};
use dojo_session::{
    Access, ApiClient, Config, FileStore, HttpTransport, SessionManager,
    DEFAULT_BASE_URL,
};
use std::path::PathBuf;
use structopt::StructOpt;

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::init();
    let args = Args::from_args();

    log::debug!("Using {} as the API origin", args.base_url);

    let config = Config::new(&args.base_url)
        .with_context(|| format!("\"{}\" isn't a valid URL", args.base_url))?;
    let transport = HttpTransport::new(config.clone())?;

    // the session file plays the role of the browser's local storage, so
    // credentials survive between invocations
    let store = FileStore::new(args.session_file());
    let session = SessionManager::init(config, transport, store);
    let api = ApiClient::new(session);

    match args.cmd {
        Command::Login { email, password } => {
            let user = api.session().login(&email, &password).await?;
            println!(
                "Logged in as {} <{}> ({})",
                user.display_name, user.email, user.role
            );
        },
        Command::Logout => {
            api.session().logout().await?;
            println!("Logged out");
        },
        Command::Status => {
            println!("{}", api.session().status().await);
        },
        Command::Get { path, public } => {
            let body: serde_json::Value =
                api.get(&path, access(public)).await?;
            print_json(&body)?;
        },
        Command::Post { path, body, public } => {
            let body: serde_json::Value = serde_json::from_str(&body)
                .context("The request body must be valid JSON")?;
            let response: serde_json::Value =
                api.post(&path, access(public), &body).await?;
            print_json(&response)?;
        },
        Command::Delete { path } => {
            api.delete(&path, Access::Protected).await?;
            println!("Deleted {}", path);
        },
    }

    Ok(())
}

fn access(public: bool) -> Access {
    if public {
        Access::Public
    } else {
        Access::Protected
    }
}

fn print_json(value: &serde_json::Value) -> Result<(), Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[derive(Debug, StructOpt)]
struct Args {
    #[structopt(
        long = "base-url",
        env = "DOJO_API_URL",
        default_value = DEFAULT_BASE_URL,
        help = "The Dojo API's base URL"
    )]
    base_url: String,
    #[structopt(
        long = "session-file",
        parse(from_os_str),
        help = "Where to keep credentials between runs"
    )]
    session_file: Option<PathBuf>,
    #[structopt(subcommand)]
    cmd: Command,
}

impl Args {
    fn session_file(&self) -> PathBuf {
        if let Some(path) = &self.session_file {
            return path.clone();
        }

        std::env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_default()
            .join(".dojo-session.json")
    }
}

#[derive(Debug, StructOpt)]
enum Command {
    /// Log in and remember the session.
    Login {
        #[structopt(short = "e", long = "email", help = "Your email address")]
        email: String,
        #[structopt(
            short = "p",
            long = "password",
            env = "DOJO_PASSWORD",
            hide_env_values = true,
            help = "Your password"
        )]
        password: String,
    },
    /// Log out, forgetting the stored session.
    Logout,
    /// Print whether we're logged in.
    Status,
    /// Fetch a resource and print it as JSON.
    Get {
        path: String,
        #[structopt(long = "public", help = "Send without requiring a login")]
        public: bool,
    },
    /// Send a JSON body to a resource.
    Post {
        path: String,
        body: String,
        #[structopt(long = "public", help = "Send without requiring a login")]
        public: bool,
    },
    /// Delete a resource.
    Delete { path: String },
}
