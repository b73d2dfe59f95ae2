use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{debug, info};
use tabled::{Table, Tabled};

use netatmo_rs::config::{get_config_path, load_credentials_from};
use netatmo_rs::{
    CameraPictureOptions, Credentials, DateEnd, Device, DeviceFilter, HomeDataOptions,
    MeasureOptions, NetatmoClient, StationsDataOptions,
};

#[derive(Parser)]
#[command(name = "netatmo")]
#[command(about = "A CLI for querying Netatmo weather stations, thermostats, cameras and home coaches")]
#[command(version)]
struct Cli {
    /// Application client ID
    #[arg(long, env = "NETATMO_CLIENT_ID")]
    client_id: Option<String>,

    /// Application client secret
    #[arg(long, env = "NETATMO_CLIENT_SECRET")]
    client_secret: Option<String>,

    /// Username for the Netatmo account
    #[arg(long, env = "NETATMO_USERNAME")]
    username: Option<String>,

    /// Password for the Netatmo account (prompted for when missing)
    #[arg(long, env = "NETATMO_PASSWORD")]
    password: Option<String>,

    /// Pre-issued access token, bypassing the password grant
    #[arg(long, env = "NETATMO_ACCESS_TOKEN")]
    access_token: Option<String>,

    /// Credentials file (defaults to ~/.netatmo.yml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List weather stations
    Stations {
        #[arg(long)]
        device: Option<String>,
        /// Include favourite stations
        #[arg(long)]
        favorites: bool,
    },
    /// List thermostats
    Thermostats {
        #[arg(long)]
        device: Option<String>,
    },
    /// List air quality home coaches
    Homecoach {
        #[arg(long)]
        device: Option<String>,
    },
    /// Print historical measurements as JSON
    Measure {
        #[arg(long)]
        device: String,
        #[arg(long)]
        module: Option<String>,
        #[arg(long, default_value = "max")]
        scale: String,
        /// Measurement types, comma separated (e.g. Temperature,CO2)
        #[arg(long = "type", required = true, value_delimiter = ',')]
        types: Vec<String>,
        /// Start, in epoch seconds or milliseconds
        #[arg(long)]
        begin: Option<i64>,
        /// End, in epoch seconds or milliseconds, or "last"
        #[arg(long)]
        end: Option<String>,
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Print home, camera and person data as JSON
    Home {
        #[arg(long)]
        home: Option<String>,
        #[arg(long)]
        size: Option<u32>,
    },
    /// Download a camera snapshot
    Picture {
        #[arg(long)]
        image_id: String,
        #[arg(long)]
        key: String,
        #[arg(long, short)]
        output: PathBuf,
    },
}

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    device_type: String,
    #[tabled(rename = "Modules")]
    modules: usize,
    #[tabled(rename = "Reachable")]
    reachable: String,
}

impl From<&Device> for DeviceRow {
    fn from(device: &Device) -> Self {
        Self {
            id: device.id.clone(),
            name: device.display_name().to_string(),
            device_type: device
                .device_type
                .clone()
                .unwrap_or_else(|| "Unknown".to_string()),
            modules: device.module_count(),
            reachable: match device.is_reachable() {
                Some(true) => "Yes".to_string(),
                Some(false) => "No".to_string(),
                None => "-".to_string(),
            },
        }
    }
}

fn resolve_credentials(cli: &Cli) -> Result<Credentials> {
    let mut credentials = match &cli.config {
        Some(path) => load_credentials_from(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => match get_config_path() {
            Ok(path) if path.exists() => load_credentials_from(&path)
                .with_context(|| format!("Failed to load {}", path.display()))?,
            _ => Credentials::default(),
        },
    };

    let overrides = [
        (&cli.client_id, &mut credentials.client_id),
        (&cli.client_secret, &mut credentials.client_secret),
        (&cli.username, &mut credentials.username),
        (&cli.password, &mut credentials.password),
    ];
    for (flag, field) in overrides {
        if let Some(value) = flag {
            *field = value.clone();
        }
    }
    if cli.access_token.is_some() {
        credentials.access_token = cli.access_token.clone();
    }

    if credentials.preissued_token().is_none()
        && !credentials.username.is_empty()
        && credentials.password.is_empty()
    {
        credentials.password = rpassword::prompt_password("Netatmo password: ")
            .context("Failed to read password")?;
    }

    Ok(credentials)
}

fn print_devices(devices: &[Device], empty_message: &str) {
    if devices.is_empty() {
        println!("{}", empty_message);
        return;
    }

    let rows: Vec<DeviceRow> = devices.iter().map(DeviceRow::from).collect();
    println!("{}", Table::new(&rows));
}

fn parse_date_end(value: &str) -> Result<DateEnd> {
    if value.eq_ignore_ascii_case("last") {
        return Ok(DateEnd::Last);
    }
    let timestamp = value
        .parse::<i64>()
        .with_context(|| format!("Invalid --end value: {}", value))?;
    Ok(DateEnd::At(timestamp))
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let credentials = resolve_credentials(&cli)?;

    let client = NetatmoClient::new(credentials);

    info!("Authenticating with Netatmo...");
    client.authenticate().await?;
    debug!("Authentication successful");

    match cli.command {
        Commands::Stations { device, favorites } => {
            let devices = client
                .get_stations_data(StationsDataOptions {
                    device_id: device,
                    get_favorites: favorites.then_some(true),
                })
                .await?;
            print_devices(&devices, "No weather stations found for this account.");
        }
        Commands::Thermostats { device } => {
            let devices = client
                .get_thermostats_data(DeviceFilter { device_id: device })
                .await?;
            print_devices(&devices, "No thermostats found for this account.");
        }
        Commands::Homecoach { device } => {
            let devices = client
                .get_healthy_home_coach_data(DeviceFilter { device_id: device })
                .await?;
            print_devices(&devices, "No home coaches found for this account.");
        }
        Commands::Measure {
            device,
            module,
            scale,
            types,
            begin,
            end,
            limit,
        } => {
            let options = MeasureOptions {
                module_id: module,
                date_begin: begin,
                date_end: end.as_deref().map(parse_date_end).transpose()?,
                limit,
                ..MeasureOptions::new(device, scale, types)
            };
            let measure = client.get_measure(options).await?;
            println!("{}", serde_json::to_string_pretty(&measure)?);
        }
        Commands::Home { home, size } => {
            let home_data = client
                .get_home_data(HomeDataOptions {
                    home_id: home,
                    size,
                })
                .await?;
            println!("{}", serde_json::to_string_pretty(&home_data)?);
        }
        Commands::Picture {
            image_id,
            key,
            output,
        } => {
            let picture = client
                .get_camera_picture(CameraPictureOptions { image_id, key })
                .await?;
            fs::write(&output, &picture)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!("Saved {} bytes to {}", picture.len(), output.display());
        }
    }

    client.shutdown();
    Ok(())
}
