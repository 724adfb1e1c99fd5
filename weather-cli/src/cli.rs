use std::{fmt, sync::Arc};

use anyhow::Context;
use clap::{Parser, Subcommand};
use inquire::{InquireError, Password, PasswordDisplayMode, Select, Text, required};
use tracing::debug;
use weather_core::{
    Config, FilePreferenceStore, MemoryPreferenceStore, PreferenceStore, ViewState,
    WeatherViewModel, provider_from_config,
};

use crate::render;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather", version, about = "Weather CLI")]
pub struct Cli {
    /// Log debug output to stderr (RUST_LOG takes precedence).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Keep preferences in memory only; nothing is read from or written to disk.
    #[arg(long, global = true)]
    pub no_persist: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the WeatherAPI.com API key (and optionally a custom base URL).
    Configure,

    /// Show current weather for a city.
    Show {
        /// City name or any query WeatherAPI.com accepts.
        city: String,

        /// Open the detail view instead of the summary card.
        #[arg(long)]
        details: bool,

        /// Remember the city for `weather saved` and interactive mode.
        #[arg(long)]
        save: bool,
    },

    /// Show the detail view for the remembered city.
    Saved,

    /// Search repeatedly; opening details remembers the city.
    Interactive,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::Show { city, details, save } => {
                let vm = view_model(self.no_persist, Restore::Skip)?;
                vm.search(city.trim());

                let state = vm.settled().await;
                if let ViewState::Error(err) = &state {
                    return Err(err.clone().into());
                }
                if details {
                    vm.toggle_details();
                }
                if save {
                    if let Some(snapshot) = state.snapshot() {
                        vm.persist_current_city(&snapshot.location_name);
                    }
                }

                println!("{}", render::view(&vm.state()));
                Ok(())
            }
            Command::Saved => {
                let vm = view_model(self.no_persist, Restore::SavedCity)?;
                match vm.settled().await {
                    ViewState::Error(err) => Err(err.into()),
                    state => {
                        println!("{}", render::view(&state));
                        Ok(())
                    }
                }
            }
            Command::Interactive => {
                let vm = view_model(self.no_persist, Restore::SavedCity)?;
                interactive(&vm).await
            }
        }
    }
}

fn configure() -> anyhow::Result<()> {
    let mut config = Config::load()?;

    if config.is_configured() {
        println!("An API key is already configured; entering a new one replaces it.");
    }

    let api_key = Password::new("WeatherAPI.com API key:")
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .with_validator(required!("An API key is required"))
        .prompt()
        .context("Failed to read API key")?;

    let base_url = Text::new("API base URL:")
        .with_default(config.base_url())
        .prompt()
        .context("Failed to read base URL")?;

    config.set_api_key(api_key.trim().to_string());
    config.set_base_url(&base_url);
    config.save()?;

    println!("Saved configuration to {}", Config::config_file_path()?.display());
    Ok(())
}

/// Whether a new view model starts by searching the remembered city.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Restore {
    SavedCity,
    Skip,
}

fn view_model(no_persist: bool, restore: Restore) -> anyhow::Result<WeatherViewModel> {
    let config = Config::load()?;
    let provider = provider_from_config(&config)?;

    let prefs: Arc<dyn PreferenceStore> = if no_persist {
        Arc::new(MemoryPreferenceStore::new())
    } else {
        let store = FilePreferenceStore::open_default()?;
        debug!(path = %store.path().display(), "using preferences file");
        Arc::new(store)
    };

    Ok(match restore {
        Restore::SavedCity => WeatherViewModel::new(provider, prefs),
        Restore::Skip => WeatherViewModel::without_restore(provider, prefs),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Choice {
    OpenDetails,
    ShowSummary,
    Search,
    Quit,
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Choice::OpenDetails => "Open details and remember city",
            Choice::ShowSummary => "Back to summary",
            Choice::Search => "Search a location",
            Choice::Quit => "Quit",
        })
    }
}

fn choices_for(state: &ViewState) -> Vec<Choice> {
    match state {
        ViewState::Success { showing_details: false, .. } => {
            vec![Choice::OpenDetails, Choice::Search, Choice::Quit]
        }
        ViewState::Success { showing_details: true, .. } => {
            vec![Choice::ShowSummary, Choice::Search, Choice::Quit]
        }
        _ => vec![Choice::Search, Choice::Quit],
    }
}

async fn interactive(vm: &WeatherViewModel) -> anyhow::Result<()> {
    loop {
        let state = vm.settled().await;
        println!("\n{}\n", render::view(&state));

        let choice = match Select::new("What next?", choices_for(&state)).prompt() {
            Ok(choice) => choice,
            Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => break,
            Err(err) => return Err(err.into()),
        };

        match choice {
            Choice::Search => {
                let city = match Text::new("Search Location:")
                    .with_validator(required!("Please enter a city"))
                    .prompt()
                {
                    Ok(city) => city,
                    Err(InquireError::OperationCanceled) => continue,
                    Err(InquireError::OperationInterrupted) => break,
                    Err(err) => return Err(err.into()),
                };
                vm.search(city.trim());
                println!("{}", render::view(&vm.state()));
            }
            Choice::OpenDetails => {
                vm.toggle_details();
                if let Some(snapshot) = state.snapshot() {
                    vm.persist_current_city(&snapshot.location_name);
                }
            }
            Choice::ShowSummary => {
                vm.toggle_details();
            }
            Choice::Quit => break,
        }
    }

    Ok(())
}
