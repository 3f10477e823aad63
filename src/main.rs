use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use chrono::{Datelike, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};

use chat_diary_lib::backup;
use chat_diary_lib::chat::{Attachment, ChatMessage, Draft, Sender};
use chat_diary_lib::config::AppConfig;
use chat_diary_lib::diary::{DiaryEntry, Mood};
use chat_diary_lib::logging;
use chat_diary_lib::persona::{ApiConfig, Persona, ProviderKind, ReplyStyle};
use chat_diary_lib::polish::PolishField;
use chat_diary_lib::prompts::DiaryStyle;
use chat_diary_lib::splitter::Pacing;
use chat_diary_lib::{today, DiaryApp};

/// ChatDiary - chat with an AI companion, keep a diary
#[derive(Parser)]
#[command(name = "chat-diary", version, about)]
struct Cli {
    /// Where the diary database and logs live
    #[arg(long, env = "CHAT_DIARY_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Day to work on (YYYY-MM-DD); defaults to today
    #[arg(long)]
    date: Option<NaiveDate>,

    /// Print replies at once instead of simulating typing
    #[arg(long)]
    immediate: bool,

    /// Echo log lines to stderr
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Talk to the companion
    #[command(subcommand)]
    Chat(ChatCommand),
    /// Generate, write and browse diary entries
    #[command(subcommand)]
    Diary(DiaryCommand),
    /// Leave a comment from today on an older entry
    Comment {
        /// Diary id
        id: String,
    },
    /// Ask the writing assistant about today's draft
    Polish {
        /// What to change; empty asks for a general polish
        #[arg(default_value = "")]
        instruction: String,
        /// Write the proposed edits into the draft
        #[arg(long)]
        apply: bool,
        /// Ask again instead of sending a new instruction
        #[arg(long, conflicts_with = "instruction")]
        reroll: bool,
    },
    /// Manage personas
    #[command(subcommand)]
    Persona(PersonaCommand),
    /// Manage API configurations
    #[command(subcommand)]
    Config(ConfigCommand),
    /// List the models the selected API configuration offers
    Models,
    /// Show or edit the user profile
    #[command(subcommand)]
    Profile(ProfileCommand),
    /// Write a JSON backup
    Export {
        /// Output file; defaults to chatdairy-backup-<date>.json
        file: Option<PathBuf>,
    },
    /// Restore a JSON backup
    Import {
        file: PathBuf,
    },
}

#[derive(Subcommand)]
enum ChatCommand {
    /// Send a message and wait for the reply
    Send {
        text: String,
        /// Attach an image file
        #[arg(long)]
        image: Option<PathBuf>,
        /// Only store the message
        #[arg(long)]
        no_reply: bool,
    },
    /// Ask for a reply to the current log
    Reply,
    /// Replace the last reply
    Reroll,
    /// Print the log
    Show,
    /// Start over with a greeting
    Clear,
}

#[derive(Subcommand)]
enum DiaryCommand {
    /// Turn the day's chat into an entry
    Generate {
        /// no_ai_trace or with_ai_trace
        #[arg(long, default_value = "no_ai_trace")]
        style: String,
    },
    /// Save today's draft as an entry; flags override the draft's fields
    Write(DraftArgs),
    /// Update today's draft without saving an entry
    Draft(DraftArgs),
    /// List entries, optionally for one month (YYYY-MM)
    List {
        #[arg(long)]
        month: Option<String>,
    },
    Show {
        id: String,
    },
    Delete {
        id: String,
    },
}

#[derive(Args)]
struct DraftArgs {
    #[arg(long, default_value = "")]
    title: String,
    #[arg(long, default_value = "")]
    content: String,
    #[arg(long)]
    mood: Option<String>,
    /// Comma separated
    #[arg(long, default_value = "")]
    tags: String,
    #[arg(long, default_value = "")]
    category: String,
}

impl DraftArgs {
    /// Apply the flags that were given onto `draft`
    fn merge_into(self, mut draft: Draft) -> Draft {
        if !self.title.is_empty() {
            draft.title = self.title;
        }
        if !self.content.is_empty() {
            draft.content = self.content;
        }
        if let Some(mood) = self.mood {
            draft.mood = Mood::from_label(&mood);
        }
        if !self.tags.is_empty() {
            draft.tags = self
                .tags
                .split(',')
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect();
        }
        if !self.category.is_empty() {
            draft.category = self.category;
        }
        draft
    }
}

#[derive(Subcommand)]
enum PersonaCommand {
    List,
    Add {
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        /// warm, analytical, concise or humorous
        #[arg(long, default_value = "warm")]
        style: String,
        #[arg(long, default_value = "")]
        prompt: String,
    },
    Select {
        id: String,
    },
    Delete {
        id: String,
    },
}

#[derive(Subcommand)]
enum ConfigCommand {
    List,
    Add {
        name: String,
        /// openai, deepseek, google or custom
        #[arg(long, default_value = "openai")]
        provider: String,
        #[arg(long, env = "CHAT_DIARY_API_KEY")]
        key: String,
        #[arg(long)]
        base_url: Option<String>,
        #[arg(long)]
        model: Option<String>,
    },
    Select {
        id: String,
    },
    Delete {
        id: String,
    },
}

#[derive(Subcommand)]
enum ProfileCommand {
    Show,
    /// Set one field, e.g. `profile set residence Berlin`
    Set {
        key: String,
        value: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::set_echo_stderr(cli.verbose > 0);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = match cli.data_dir {
        Some(dir) => AppConfig::with_data_dir(dir, Pacing::Natural),
        None => AppConfig::from_env(),
    };
    if cli.immediate {
        config.pacing = Pacing::Immediate;
    }

    let mut app = DiaryApp::open(&config).context("failed to open the diary store")?;
    if let Some(date) = cli.date {
        app.set_active_date(date);
    }

    match cli.command {
        Command::Chat(cmd) => chat(&mut app, cmd).await,
        Command::Diary(cmd) => diary(&mut app, cmd).await,
        Command::Comment { id } => {
            let text = app.generate_comment(&id).await?;
            app.add_ai_comment(&id, &text)?;
            println!("{text}");
            Ok(())
        }
        Command::Polish { instruction, apply, reroll } => {
            let update = if reroll {
                app.reroll_polish(apply).await?
            } else {
                app.polish_draft(&instruction, apply).await?
            };
            println!("{}", update.message);
            for field in &update.fields {
                match field {
                    PolishField::Title(title) => println!("\n[title] {title}"),
                    PolishField::Tags(tags) => println!("\n[tags] {}", tags.join(", ")),
                    PolishField::Content(content) => println!("\n[content]\n{content}"),
                }
            }
            if update.has_changes() && !apply {
                println!("\n(pass --apply to write edits into the draft)");
            }
            Ok(())
        }
        Command::Persona(cmd) => persona(&mut app, cmd),
        Command::Config(cmd) => api_config(&mut app, cmd),
        Command::Models => {
            let config = app.personas().current_api_config();
            for model in app.fetch_models(&config).await? {
                match model.name {
                    Some(name) => println!("{}  ({})", model.id, name),
                    None => println!("{}", model.id),
                }
            }
            Ok(())
        }
        Command::Profile(ProfileCommand::Show) => {
            println!("{}", serde_json::to_string_pretty(app.profile().profile())?);
            Ok(())
        }
        Command::Profile(ProfileCommand::Set { key, value }) => {
            app.profile_mut().update(|p| p.set_field(&key, &value))?;
            Ok(())
        }
        Command::Export { file } => {
            let path = file.unwrap_or_else(|| PathBuf::from(backup::backup_file_name(today())));
            std::fs::write(&path, app.export_backup()?)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Exported to {}", path.display());
            Ok(())
        }
        Command::Import { file } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let summary = app.import_backup(&raw)?;
            println!(
                "Imported: {} diaries, {} personas, {} API configs",
                summary.diaries.unwrap_or(0),
                summary.personas.unwrap_or(0),
                summary.api_configs.unwrap_or(0)
            );
            Ok(())
        }
    }
}

fn print_message(message: &ChatMessage) {
    let who = match message.sender {
        Sender::User => "you",
        Sender::Ai => "ai",
    };
    let image = if message.attachment.is_some() { " [image]" } else { "" };
    println!("{who}: {}{image}", message.text);
}

async fn chat(app: &mut DiaryApp, cmd: ChatCommand) -> anyhow::Result<()> {
    match cmd {
        ChatCommand::Send { text, image, no_reply } => {
            let attachment = image.as_deref().map(Attachment::from_image_file).transpose()?;
            app.send_message(&text, attachment)?;
            if !no_reply {
                app.trigger_ai_response(print_message).await?;
            }
        }
        ChatCommand::Reply => {
            app.trigger_ai_response(print_message).await?;
        }
        ChatCommand::Reroll => {
            if app.regenerate_last_response(print_message).await?.is_empty() {
                println!("Nothing to reroll: the last message is not a reply.");
            }
        }
        ChatCommand::Show => {
            println!("# {}", app.active_date());
            app.messages().iter().for_each(print_message);
        }
        ChatCommand::Clear => app.clear_chat()?,
    }
    Ok(())
}

fn print_entry_line(entry: &DiaryEntry) {
    println!("{}  {}  {:<8} {}", entry.id, entry.date, entry.mood.as_str(), entry.title);
}

async fn diary(app: &mut DiaryApp, cmd: DiaryCommand) -> anyhow::Result<()> {
    match cmd {
        DiaryCommand::Generate { style } => {
            let generated = app.generate_diary(DiaryStyle::from_key(&style)).await?;
            let entry = app.save_generated_diary(generated)?;
            print_entry_line(&entry);
            println!("\n{}", entry.content);
        }
        DiaryCommand::Write(args) => {
            let draft = args.merge_into(app.chat_log().load_draft(app.active_date()).unwrap_or_default());
            let entry = app.save_manual_diary(&draft).await?;
            print_entry_line(&entry);
        }
        DiaryCommand::Draft(args) => {
            let date = app.active_date();
            let mut draft = args.merge_into(app.chat_log().load_draft(date).unwrap_or_default());
            draft.timestamp = Utc::now().timestamp_millis();
            app.chat_log().save_draft(date, &draft)?;
            println!("Draft for {date}: {}\n\n{}", draft.title, draft.content);
        }
        DiaryCommand::List { month } => {
            let entries: Vec<&DiaryEntry> = match month {
                Some(month) => {
                    let first = NaiveDate::parse_from_str(&format!("{month}-01"), "%Y-%m-%d")
                        .with_context(|| format!("invalid month: {month}"))?;
                    app.diaries().in_month(first.year(), first.month())
                }
                None => app.diaries().all().iter().collect(),
            };
            entries.into_iter().for_each(print_entry_line);
        }
        DiaryCommand::Show { id } => {
            let entry = app
                .diaries()
                .by_id(&id)
                .with_context(|| format!("no diary with id {id}"))?;
            println!("{}\n{} | {} | {}\n", entry.title, entry.date, entry.mood.as_str(), entry.tags.join(", "));
            println!("{}", entry.content);
            for comment in &entry.comments {
                println!("\n> {}", comment.text);
            }
        }
        DiaryCommand::Delete { id } => {
            app.diaries_mut().delete(&id)?;
            println!("Deleted {id}");
        }
    }
    Ok(())
}

fn persona(app: &mut DiaryApp, cmd: PersonaCommand) -> anyhow::Result<()> {
    let personas = app.personas_mut();
    match cmd {
        PersonaCommand::List => {
            let current = personas.current_persona_id().to_string();
            for p in personas.personas() {
                let marker = if p.id == current { "*" } else { " " };
                println!("{marker} {}  {}  ({})", p.id, p.name, p.reply_style.as_str());
            }
        }
        PersonaCommand::Add { name, description, style, prompt } => {
            let mut persona = Persona::new(name, description);
            persona.reply_style = ReplyStyle::from(style);
            persona.custom_prompt = prompt;
            let id = personas.add_persona(persona)?;
            println!("{id}");
        }
        PersonaCommand::Select { id } => personas.select_persona(&id)?,
        PersonaCommand::Delete { id } => personas.delete_persona(&id)?,
    }
    Ok(())
}

fn api_config(app: &mut DiaryApp, cmd: ConfigCommand) -> anyhow::Result<()> {
    let personas = app.personas_mut();
    match cmd {
        ConfigCommand::List => {
            let current = personas.current_api_config_id().to_string();
            for c in personas.api_configs() {
                let marker = if c.id == current { "*" } else { " " };
                let key = if c.api_key.is_empty() { "no key" } else { "key set" };
                println!(
                    "{marker} {}  {}  {}  {}  [{}]",
                    c.id,
                    c.name,
                    c.provider_kind().display_name(),
                    c.model(),
                    key
                );
            }
        }
        ConfigCommand::Add { name, provider, key, base_url, model } => {
            let mut config = ApiConfig::for_provider(name, ProviderKind::from(provider), key, base_url.as_deref());
            config.model = model;
            let id = personas.add_api_config(config)?;
            println!("{id}");
        }
        ConfigCommand::Select { id } => personas.select_api_config(&id)?,
        ConfigCommand::Delete { id } => personas.delete_api_config(&id)?,
    }
    Ok(())
}
