use std::io::{self, BufRead, IsTerminal, Write};

use anyhow::{Context, anyhow, bail};
use taskmate_shared::TaskId;
use tracing::{debug, info, instrument, warn};

use crate::cli::Invocation;
use crate::form::FormMode;
use crate::view::{AuthForm, Confirm, Outcome, ViewController};

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "login", "register", "logout", "list", "add", "edit", "done", "complete", "delete",
        "status", "shell", "help", "version",
    ]
}

/// Commands that only make sense inside `shell`, where the form survives
/// between lines.
fn shell_command_names() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = known_command_names()
        .into_iter()
        .filter(|name| *name != "shell")
        .collect();
    names.extend(["save", "cancel", "form", "quit", "exit"]);
    names
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

/// Asks on the terminal before destructive actions unless told to assume
/// yes (`--yes` or `confirmation=off`).
#[derive(Debug, Clone, Copy)]
pub struct PromptConfirm {
    assume_yes: bool,
}

impl PromptConfirm {
    pub fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }
}

impl Confirm for PromptConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        if self.assume_yes {
            return true;
        }
        eprint!("{prompt} (yes/no) ");
        let _ = io::stderr().flush();
        match read_line() {
            Ok(Some(answer)) => matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
            Ok(None) => false,
            Err(err) => {
                warn!(error = %err, "failed to read confirmation");
                false
            }
        }
    }
}

#[instrument(skip(view, inv, confirm), fields(command = %inv.command))]
pub async fn dispatch(
    view: &mut ViewController,
    inv: &Invocation,
    confirm: &dyn Confirm,
) -> anyhow::Result<Outcome> {
    debug!(args = ?inv.command_args, "dispatching command");
    view.restore_session();

    let outcome = match inv.command.as_str() {
        "shell" => run_shell(view, confirm).await,
        other => run_command(view, other, &inv.command_args, confirm, false).await,
    };
    view.flush();
    if let Ok(result) = &outcome {
        info!(outcome = ?result, "done");
    }
    outcome
}

#[instrument(skip(view, args, confirm))]
async fn run_command(
    view: &mut ViewController,
    command: &str,
    args: &[String],
    confirm: &dyn Confirm,
    interactive: bool,
) -> anyhow::Result<Outcome> {
    match command {
        "login" => cmd_login(view, args).await,
        "register" => cmd_register(view, args).await,
        "logout" => Ok(view.logout()),
        "list" => Ok(view.show_tasks().await),
        "add" => cmd_add(view, args).await,
        "edit" => cmd_edit(view, args, interactive).await,
        "done" | "complete" => {
            let id = parse_id(command, args)?;
            Ok(view.complete(id).await)
        }
        "delete" => {
            let id = parse_id(command, args)?;
            Ok(view.delete(id, confirm).await)
        }
        "status" => Ok(cmd_status(view).await),
        "help" => {
            print_help(interactive);
            Ok(Outcome::Done)
        }
        "version" => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(Outcome::Done)
        }
        "save" if interactive => Ok(view.submit_task_form().await),
        "cancel" if interactive => {
            view.cancel_edit();
            Ok(Outcome::Done)
        }
        "form" if interactive => {
            if args.is_empty() {
                bail!("form requires key:value fields");
            }
            apply_fields(view, args)?;
            Ok(Outcome::Done)
        }
        other => Err(anyhow!("unknown command: {other}")),
    }
}

async fn cmd_login(view: &mut ViewController, args: &[String]) -> anyhow::Result<Outcome> {
    let username = args
        .first()
        .ok_or_else(|| anyhow!("usage: login <username> [password]"))?;
    let password = match args.get(1) {
        Some(password) => password.clone(),
        None => {
            eprint!("Password: ");
            let _ = io::stderr().flush();
            read_line()?.ok_or_else(|| anyhow!("no password given"))?
        }
    };
    Ok(view.login(username, password.trim_end_matches(['\r', '\n'])).await)
}

async fn cmd_register(view: &mut ViewController, args: &[String]) -> anyhow::Result<Outcome> {
    let [username, password, email] = args else {
        view.show_auth_form(AuthForm::Register);
        bail!("usage: register <username> <password> <email>");
    };
    Ok(view.register(username, password, email).await)
}

async fn cmd_add(view: &mut ViewController, args: &[String]) -> anyhow::Result<Outcome> {
    let (title, fields) = parse_title_and_fields(args);
    if view.form().mode() != FormMode::Create {
        view.cancel_edit();
    }
    let form = view.form_mut();
    form.clear();
    form.title = title;
    for (key, value) in &fields {
        view.set_form_field(key, value)?;
    }
    Ok(view.submit_task_form().await)
}

/// One-shot `edit` must carry fields; inside `shell` a bare `edit <id>`
/// only loads the task into the form.
async fn cmd_edit(
    view: &mut ViewController,
    args: &[String],
    interactive: bool,
) -> anyhow::Result<Outcome> {
    let id = parse_id("edit", args)?;
    let fields = parse_fields(&args[1..]);
    if fields.is_empty() && !interactive {
        bail!("edit requires at least one field, e.g. title:\"New title\" or priority:high");
    }

    if view.tasks().find(id).is_none() {
        debug!(id, "task not cached; loading tasks before edit");
        if view.show_tasks().await.is_failed() {
            return Ok(Outcome::Failed);
        }
    }
    if view.begin_edit(id).is_failed() {
        return Ok(Outcome::Failed);
    }
    if fields.is_empty() {
        return Ok(Outcome::Done);
    }

    for (key, value) in &fields {
        view.set_form_field(key, value)?;
    }
    Ok(view.submit_task_form().await)
}

async fn cmd_status(view: &mut ViewController) -> Outcome {
    let session = view.session();
    println!("api       {}", view.api_base_url());
    match session.user() {
        Some(user) => println!("user      {} <{}>", user.username, user.email),
        None if session.is_authenticated() => println!("user      (token stored)"),
        None => println!("user      (not logged in)"),
    }
    view.check_token().await
}

fn apply_fields(view: &mut ViewController, args: &[String]) -> anyhow::Result<()> {
    let fields = parse_fields(args);
    if fields.is_empty() {
        bail!("no recognized key:value fields in: {}", args.join(" "));
    }
    for (key, value) in &fields {
        view.set_form_field(key, value)?;
    }
    Ok(())
}

#[instrument(skip(view, confirm))]
async fn run_shell(view: &mut ViewController, confirm: &dyn Confirm) -> anyhow::Result<Outcome> {
    let interactive = io::stdin().is_terminal();
    let known = shell_command_names();
    info!("starting shell");

    if view.session().is_authenticated() {
        let _ = view.show_tasks().await;
    } else {
        view.show_auth_form(AuthForm::Login);
    }
    view.flush();

    loop {
        if interactive {
            print!("taskmate> ");
            io::stdout().flush().context("failed to flush prompt")?;
        }
        let Some(line) = read_line()? else {
            break;
        };
        let tokens = match split_line(&line) {
            Ok(tokens) => tokens,
            Err(err) => {
                eprintln!("error: {err:#}");
                continue;
            }
        };
        let Some((first, args)) = tokens.split_first() else {
            continue;
        };
        let Some(command) = expand_command_abbrev(first, &known) else {
            eprintln!("error: unknown or ambiguous command: {first}");
            continue;
        };
        if matches!(command, "quit" | "exit") {
            break;
        }

        if let Err(err) = run_command(view, command, args, confirm, true).await {
            eprintln!("error: {err:#}");
        }
        view.flush();
    }

    info!("shell finished");
    Ok(Outcome::Done)
}

fn parse_id(command: &str, args: &[String]) -> anyhow::Result<TaskId> {
    let raw = args
        .first()
        .ok_or_else(|| anyhow!("usage: {command} <id>"))?;
    raw.parse::<TaskId>()
        .with_context(|| format!("invalid task id: {raw}"))
}

fn parse_one_field(tok: &str) -> Option<(String, String)> {
    let (key, value) = tok.split_once(':').or_else(|| tok.split_once('='))?;
    let key = key.to_ascii_lowercase();
    match key.as_str() {
        "title" | "desc" | "description" | "due" | "duedate" | "due_date" | "pri"
        | "priority" => Some((key, value.to_string())),
        _ => None,
    }
}

fn parse_fields(args: &[String]) -> Vec<(String, String)> {
    let mut fields = Vec::new();
    for arg in args {
        if let Some(field) = parse_one_field(arg) {
            fields.push(field);
        } else {
            warn!(arg = %arg, "unrecognized field token ignored");
        }
    }
    fields
}

/// Words before `--` that are not `key:value` fields form the title.
fn parse_title_and_fields(args: &[String]) -> (String, Vec<(String, String)>) {
    let mut title_parts = Vec::new();
    let mut fields = Vec::new();

    let mut literal = false;
    for arg in args {
        if arg == "--" {
            literal = true;
            continue;
        }
        if !literal && let Some(field) = parse_one_field(arg) {
            fields.push(field);
            continue;
        }
        title_parts.push(arg.as_str());
    }

    (title_parts.join(" "), fields)
}

/// Splits a shell line on whitespace, honoring single and double quotes.
fn split_line(line: &str) -> anyhow::Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quote: Option<char> = None;

    for ch in line.chars() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => current.push(ch),
            None if ch == '"' || ch == '\'' => {
                quote = Some(ch);
                in_token = true;
            }
            None if ch.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            None => {
                current.push(ch);
                in_token = true;
            }
        }
    }

    if quote.is_some() {
        bail!("unterminated quote");
    }
    if in_token {
        tokens.push(current);
    }
    Ok(tokens)
}

fn read_line() -> anyhow::Result<Option<String>> {
    let mut line = String::new();
    let read = io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed reading stdin")?;
    if read == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

fn print_help(interactive: bool) {
    println!(
        "Commands:
  login <username> [password]        log in and show your tasks
  register <username> <password> <email>
  logout                             forget the saved session
  list                               show your tasks (default)
  add <title> [description:..] [due:YYYY-MM-DD] [priority:low|medium|high]
  edit <id> [title:..] [description:..] [due:..] [priority:..]
  done <id>                          mark a task complete
  delete <id>                        delete a task (asks first)
  status                             show the server and check the saved token
  shell                              interactive session
  help | version"
    );
    if interactive {
        println!(
            "Shell only:
  edit <id>                          load a task into the form
  form <key:value>...                change form fields
  save                               create or update from the form
  cancel                             discard the edit
  quit | exit"
        );
    }
}
