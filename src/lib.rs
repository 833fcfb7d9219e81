use clap::Parser;
use colored::*;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub mod command;
pub mod config;
pub mod error;
pub mod session;
pub mod transfer;

pub use command::{build_import_command, build_kerberos_renew_command, compose_command};
pub use config::{Config, KerberosRenewal, load_config};
pub use error::ImportError;
pub use session::{RemoteCommand, RemoteProcess, RemoteSession, RemoteShell, remote_lines};
pub use transfer::upload_file;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    name = "hive-import",
    version,
    about = "Upload a sources file to the Atlas node and run the Hive import hook"
)]
pub struct Cli {
    /// Path to the JSON config file
    #[arg(short, long, default_value = config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Do not draw the upload progress bar
    #[arg(long)]
    no_progress: bool,
}

pub fn run() -> Result<(), i32> {
    let cli = Cli::parse();
    let code = match import(&cli.config, !cli.no_progress) {
        Ok(status) => report_remote_status(status),
        Err(e) => {
            println!("{}", format!("ERROR: {e}").red());
            e.exit_code()
        }
    };
    if code == 0 { Ok(()) } else { Err(code) }
}

/// Whole pipeline up to the remote exit status.
pub fn import(config_path: &Path, show_progress: bool) -> Result<i32, ImportError> {
    let config = load_config(config_path)?;
    println!("{}", "INFO: Loaded config file".green());

    let mut session = RemoteSession::new(&config);
    session.connect()?;
    println!(
        "{}",
        format!(
            "INFO: SSH connection established with remote host {} for user {}",
            config.hostname, config.username
        )
        .green()
    );

    with_session(session, |session| {
        upload_sources(session, &config, show_progress)?;
        let command = final_command(&config)?;
        run_import_command(
            session,
            &command,
            &credential_lines(&config),
            &mut io::stdout(),
            &mut io::stderr(),
        )
    })
}

/// Run `work` on a connected shell, then close the shell exactly once,
/// whether or not `work` succeeded.
pub fn with_session<S, F>(shell: S, work: F) -> Result<i32, ImportError>
where
    S: RemoteShell,
    F: FnOnce(&S) -> Result<i32, ImportError>,
{
    // Every stream and the SCP channel are finished by the time `work` returns.
    let outcome = work(&shell);
    if let Err(e) = shell.close() {
        println!("{}", format!("ERROR: failed to close SSH session: {e}").red());
    }
    outcome
}

fn upload_sources(
    session: &RemoteSession<'_>,
    config: &Config,
    show_progress: bool,
) -> Result<(), ImportError> {
    println!(
        "{}",
        format!("INFO: Copying {} file to remote node", config.sources_file).green()
    );
    upload_file(
        session,
        Path::new(&config.sources_file),
        &config.temp_write_path,
        show_progress,
    )?;
    println!(
        "{}",
        format!(
            "INFO: File {} has been copied successfully to remote node in this location: {}",
            config.sources_file, config.temp_write_path
        )
        .green()
    );
    Ok(())
}

/// The import command, preceded by the ticket renewal when Kerberos is on.
pub fn final_command(config: &Config) -> Result<String, ImportError> {
    let import_command = build_import_command(&config.atlas_home_location, &config.temp_write_path);
    println!(
        "{}",
        format!("INFO: Import hive location to be executed on remote node: {import_command}").green()
    );
    let renewal = config.kerberos_renewal().map_err(|reason| ImportError::Config {
        path: "<loaded config>".into(),
        reason,
    })?;
    Ok(compose_command(&import_command, renewal.as_ref()))
}

/// Execute `command`, answer its prompts with `credentials`, copy its
/// stdout then stderr to `out` and `err`, and return its exit status.
pub fn run_import_command<S, O, E>(
    shell: &S,
    command: &str,
    credentials: &[&str],
    out: &mut O,
    err: &mut E,
) -> Result<i32, ImportError>
where
    S: RemoteShell,
    O: Write + ?Sized,
    E: Write + ?Sized,
{
    println!("{}", format!("INFO: Executing following command: {command}").green());
    let mut process = shell.execute(command)?;
    write_credentials(process.stdin(), credentials)
        .map_err(|e| ImportError::RemoteExecution(format!("failed to send credentials: {e}")))?;

    drain_lines(remote_lines(process.stdout()), out)?;
    drain_lines(remote_lines(process.stderr()), err)?;

    process.wait()
}

/// Answers to the import script's prompts, in the order it asks.
///
/// A headless keytab makes the script ask for the SSH user's password
/// first, before the Atlas credentials.
pub fn credential_lines(config: &Config) -> Vec<&str> {
    let mut lines = Vec::with_capacity(3);
    if config.keytab_headless {
        lines.push(config.password.as_str());
    }
    lines.push(config.atlas_username.as_str());
    lines.push(config.atlas_password.as_str());
    lines
}

/// Write each value newline-terminated, then flush once.
pub fn write_credentials<W: Write + ?Sized>(stdin: &mut W, lines: &[&str]) -> io::Result<()> {
    for line in lines {
        stdin.write_all(line.as_bytes())?;
        stdin.write_all(b"\n")?;
    }
    stdin.flush()
}

/// Print every line of a remote stream to `out` until it ends.
///
/// Reading the remote side and writing locally fail with different errors.
pub fn drain_lines<I, W>(lines: I, out: &mut W) -> Result<usize, ImportError>
where
    I: Iterator<Item = io::Result<String>>,
    W: Write + ?Sized,
{
    let mut count = 0;
    for line in lines {
        let line = line.map_err(|e| {
            ImportError::RemoteExecution(format!("failed to read remote output: {e}"))
        })?;
        writeln!(out, "{line}").map_err(ImportError::LocalOutput)?;
        count += 1;
    }
    out.flush().map_err(ImportError::LocalOutput)?;
    Ok(count)
}

/// Any nonzero remote status collapses to 1.
pub fn exit_code_for(remote_status: i32) -> i32 {
    if remote_status == 0 { 0 } else { 1 }
}

fn report_remote_status(status: i32) -> i32 {
    let code = exit_code_for(status);
    if code == 0 {
        println!("{}", "INFO: Script ran successfully as exit code is 0".green());
        println!("Exiting...");
    } else {
        println!(
            "{}",
            format!("ERROR: Issue occurred as exit code is {status}, exiting...").red()
        );
    }
    code
}
