// Copyright (C) 2024 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{crate_version, Parser, Subcommand};
use duration_string::DurationString;
use samplepool::backend::{self, mock, Backend};
use samplepool::config::Config;
use samplepool::{notes, Instrument, Player};
use tracing::info;

/// How often the play command checks whether playback has finished.
const IDLE_POLL: Duration = Duration::from_millis(10);

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "An on-demand instrument sample player."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the sampled notes of the given octaves, or of every octave.
    Notes {
        /// The octaves to list, from 0 through 7.
        octaves: Vec<u8>,
    },
    /// Prepares notes and plays them together through the configured backend.
    Play {
        /// The path to the config file.
        config_path: String,
        /// The notes to play, e.g. C5 E5 G5.
        #[arg(required = true)]
        notes: Vec<String>,
        /// When to play the notes, e.g. 500ms.
        #[arg[short, long]]
        at: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Notes { octaves } => {
            for pitch in notes::pitch_list(&octaves) {
                println!("{}", pitch);
            }
        }
        Commands::Play {
            config_path,
            notes,
            at,
        } => {
            let config = Config::deserialize(&PathBuf::from(config_path))?;

            // Keep a handle on the mock so its call log can be printed afterwards.
            let mock = config
                .backend()
                .starts_with("mock")
                .then(|| mock::Backend::get(config.backend()));
            let device: Arc<dyn Backend> = match &mock {
                Some(mock) => Arc::new(mock.clone()),
                None => backend::get_backend(config.backend())?,
            };

            let at = match at {
                Some(at) => DurationString::from_string(at)?.into(),
                None => Duration::ZERO,
            };

            let instrument = Arc::new(Instrument::new(
                config.instrument(),
                device,
                config.max_streams(),
            )?);
            let player = Player::new(instrument.clone(), config.player().options()?)?;

            player.prepare(&notes).await?;
            info!(notes = notes.len(), "Notes prepared.");
            player.play(&notes, at)?;

            while !player.sequencer().is_idle() {
                tokio::time::sleep(IDLE_POLL).await;
            }
            instrument.release();

            if let Some(mock) = mock {
                println!("Calls to {}:", mock);
                for call in mock.calls() {
                    println!("- {}", call);
                }
            }
        }
    }

    Ok(())
}
