use anyhow::Context;
use clap::{Parser, Subcommand};
use griddemo::app::actions::Action;
use griddemo::app::{self, App};
use griddemo::color::{contrast_of, random_palette};
use griddemo::config;
use griddemo::model::Item;
use griddemo::storage::SqliteStore;

#[derive(Debug, Parser)]
#[command(name = "griddemo", version, about = "Pick random colors and keep named lists of them")]
struct Cli {
    /// Override config file path.
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print random colors with their readable text color (default).
    Palette {
        #[arg(long)]
        count: Option<usize>,
    },
    /// Select the given colors and save them as a new list.
    Save {
        #[arg(long)]
        name: Option<String>,
        colors: Vec<String>,
    },
    /// Show saved lists.
    Lists,
    /// Load a saved list into the selection and print it.
    Show { id: i64 },
    /// Delete a saved list.
    Remove { id: i64 },
    /// Delete all saved lists.
    Reset,
    /// Dump the raw stored record as JSON.
    Dump,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load(cli.config.as_deref()).context("load config")?;

    let command = cli.command.unwrap_or(Command::Palette { count: None });
    if let Command::Palette { count } = command {
        for color in random_palette(count.unwrap_or(cfg.palette.size)) {
            println!("{color}  text={}", contrast_of(&color));
        }
        return Ok(());
    }

    let db_path = cfg.storage.db_path();
    let mut backend = SqliteStore::open(&db_path).context("open storage")?;

    // These two must work even when the stored record no longer parses.
    match command {
        Command::Reset => {
            app::reset_saved(&cfg, &mut backend)?;
            println!("cleared saved lists");
            return Ok(());
        }
        Command::Dump => {
            let raw = app::dump_saved(&cfg, &mut backend)?.unwrap_or_default();
            match serde_json::from_str::<serde_json::Value>(&raw) {
                Ok(v) => println!("{}", serde_json::to_string_pretty(&v)?),
                Err(_) => println!("{raw}"),
            }
            return Ok(());
        }
        _ => {}
    }

    let mut app = App::new(cfg, backend)
        .with_context(|| format!("open saved lists in {}", db_path.display()))?;

    match command {
        Command::Palette { .. } | Command::Reset | Command::Dump => {}
        Command::Save { name, colors } => {
            for color in &colors {
                if !app.select_hex(color) {
                    anyhow::bail!("not a hex color: {color}");
                }
            }
            let saved = app.save_selection(name)?;
            println!("saved {} ({} colors) id={}", saved.name, saved.list.len(), saved.id);
        }
        Command::Lists => {
            let lists = app.saved_lists()?;
            if lists.is_empty() {
                println!("no saved lists");
            }
            for entry in lists {
                println!("{:>15}  {}  {}", entry.id, entry.color, entry.name);
            }
        }
        Command::Show { id } => {
            app.handle_action(Action::LoadList(id))?;
            if app.selected_lists().is_empty() {
                anyhow::bail!("no saved list with id {id}");
            }
            print_items(app.selected_items());
        }
        Command::Remove { id } => {
            app.handle_action(Action::RemoveList(id))?;
            println!("removed {id}");
        }
    }

    Ok(())
}

fn print_items(items: &[Item]) {
    for (i, item) in items.iter().enumerate() {
        println!("{}", app::describe_item(i, item));
    }
}
