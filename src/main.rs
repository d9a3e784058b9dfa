use battleship_lan::{
    init_logging, ship_kind_by_name, CellState, Coordinate, Grid, Orientation, Outcome, Phase,
    Rules, SessionHandle, SessionSnapshot, ShipKind, DEFAULT_PORT, GRID_SIZE,
};

use std::cmp::Reverse;

use anyhow::{anyhow, bail};
use clap::{Parser, Subcommand};
use rand::rngs::SmallRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    #[arg(long, global = true, help = "Fix RNG seed for reproducible games (e.g., --seed 12345)")]
    seed: Option<u64>,
    /// Place ships and fire automatically instead of reading commands.
    #[arg(long, global = true)]
    auto: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Host a game and wait for one opponent to join.
    Host {
        #[arg(long, default_value_t = DEFAULT_PORT)]
        port: u16,
    },
    /// Join a game hosted on another machine.
    Join {
        #[arg(long, default_value = "127.0.0.1")]
        address: String,
        #[arg(long, default_value_t = DEFAULT_PORT)]
        port: u16,
    },
}

#[derive(Debug, PartialEq, Eq)]
enum UserCommand {
    Place(ShipKind, Coordinate, Orientation),
    Random,
    Ready,
    Fire(Coordinate),
    Bomb(u8),
    Show,
    Quit,
}

const HELP: &str = "commands: place <ship> <cell> <h|v> | random | ready | fire <cell> | bomb <row> | show | quit";

fn parse_command(line: &str) -> anyhow::Result<UserCommand> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let cmd = match words.as_slice() {
        ["place", kind, cell, dir] => {
            let kind = ship_kind_by_name(kind).ok_or_else(|| anyhow!("unknown ship `{}`", kind))?;
            let orientation = match dir.to_ascii_lowercase().as_str() {
                "h" | "horizontal" => Orientation::Horizontal,
                "v" | "vertical" => Orientation::Vertical,
                other => bail!("orientation must be h or v, got `{}`", other),
            };
            UserCommand::Place(kind, cell.parse()?, orientation)
        }
        ["random"] => UserCommand::Random,
        ["ready"] => UserCommand::Ready,
        ["fire", cell] => UserCommand::Fire(cell.parse()?),
        ["bomb", row] => {
            let row: u8 = row.parse().map_err(|_| anyhow!("row must be 1-{}", GRID_SIZE))?;
            if row == 0 || row > GRID_SIZE {
                bail!("row must be 1-{}", GRID_SIZE);
            }
            UserCommand::Bomb(row - 1)
        }
        ["show"] => UserCommand::Show,
        ["quit"] | ["exit"] => UserCommand::Quit,
        _ => bail!("{}", HELP),
    };
    Ok(cmd)
}

fn render_grid(grid: &Grid, y: usize) -> String {
    (0..GRID_SIZE as usize)
        .map(|x| grid[x][y].glyph().to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

fn render(snapshot: &SessionSnapshot) {
    let header: String = (0..GRID_SIZE)
        .map(|x| ((b'A' + x) as char).to_string())
        .collect::<Vec<_>>()
        .join(" ");
    println!("\n     YOUR FLEET                 ENEMY WATERS");
    println!("    {}     {}", header, header);
    for y in 0..GRID_SIZE as usize {
        println!(
            "{:>2}  {}  {:>2} {}",
            y + 1,
            render_grid(&snapshot.own_grid, y),
            y + 1,
            render_grid(&snapshot.target_grid, y)
        );
    }
    if snapshot.phase == Phase::Playing {
        let bomb = if snapshot.row_bomb_cooldown == 0 {
            "ready".to_string()
        } else {
            format!("{} turns", snapshot.row_bomb_cooldown)
        };
        println!("turn {} | row bomb: {}", snapshot.turn_counter, bomb);
    }
    if !snapshot.unplaced.is_empty() && snapshot.phase <= Phase::Setup {
        let names: Vec<&str> = snapshot.unplaced.iter().map(|k| k.name()).collect();
        println!("to place: {}", names.join(", "));
    }
}

fn print_outcome(snapshot: &SessionSnapshot) {
    render(snapshot);
    match snapshot.outcome {
        Some(Outcome::Won) => println!("\nVICTORY! You have sunk all enemy ships."),
        Some(Outcome::Lost) => println!("\nDEFEAT. All your ships have been destroyed."),
        Some(Outcome::Disconnected) => println!("\nThe opponent disconnected."),
        None => {}
    }
}

async fn run_interactive(handle: &SessionHandle) -> anyhow::Result<()> {
    let mut snapshots = handle.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("{}", HELP);
    let mut last_status = String::new();
    loop {
        let snapshot = snapshots.borrow_and_update().clone();
        if snapshot.status != last_status {
            println!("> {}", snapshot.status);
            last_status = snapshot.status.clone();
        }
        if snapshot.phase == Phase::GameOver {
            print_outcome(&snapshot);
            return Ok(());
        }
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    bail!("session stopped");
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    handle.shutdown().await;
                    return Ok(());
                };
                if line.trim().is_empty() {
                    continue;
                }
                let cmd = match parse_command(&line) {
                    Ok(cmd) => cmd,
                    Err(e) => {
                        println!("{}", e);
                        continue;
                    }
                };
                let result = match cmd {
                    UserCommand::Place(kind, origin, orientation) => {
                        handle.place_ship(kind, origin, orientation).await
                    }
                    UserCommand::Random => handle.randomize_ships().await,
                    UserCommand::Ready => handle.confirm_placement().await,
                    UserCommand::Fire(cell) => handle.fire_shot(cell.x, cell.y).await,
                    UserCommand::Bomb(row) => handle.use_row_bomb(row).await,
                    UserCommand::Show => {
                        render(&handle.snapshot());
                        continue;
                    }
                    UserCommand::Quit => {
                        handle.shutdown().await;
                        return Ok(());
                    }
                };
                match result {
                    Ok(()) => render(&handle.snapshot()),
                    Err(e) => println!("! {}", e),
                }
            }
        }
    }
}

/// Row with the most cells we have not fired at yet. Ties go to the lowest row.
fn best_bomb_row(grid: &Grid) -> u8 {
    (0..GRID_SIZE)
        .min_by_key(|&y| {
            let open = (0..GRID_SIZE as usize)
                .filter(|&x| grid[x][y as usize] == CellState::Empty)
                .count();
            Reverse(open)
        })
        .unwrap_or(0)
}

fn unresolved_cells(grid: &Grid) -> Vec<Coordinate> {
    Coordinate::all()
        .filter(|c| grid[c.x as usize][c.y as usize] == CellState::Empty)
        .collect()
}

async fn run_auto(handle: &SessionHandle, rng: &mut SmallRng) -> anyhow::Result<()> {
    let mut snapshots: watch::Receiver<SessionSnapshot> = handle.subscribe();
    loop {
        let snapshot = snapshots.borrow_and_update().clone();
        match snapshot.phase {
            Phase::Menu => {}
            Phase::Setup if !snapshot.local_ready => {
                handle.randomize_ships().await?;
                handle.confirm_placement().await?;
                render(&handle.snapshot());
            }
            Phase::Setup => {}
            Phase::Playing if snapshot.is_local_turn => {
                if snapshot.can_use_row_bomb {
                    let row = best_bomb_row(&snapshot.target_grid);
                    println!("Row bomb on row {}", row + 1);
                    handle.use_row_bomb(row).await?;
                } else {
                    let cells = unresolved_cells(&snapshot.target_grid);
                    let target = cells
                        .choose(rng)
                        .copied()
                        .ok_or_else(|| anyhow!("no cells left to fire at"))?;
                    println!("Firing at {}", target);
                    handle.fire_shot(target.x, target.y).await?;
                }
                continue;
            }
            Phase::Playing => {}
            Phase::GameOver => {
                print_outcome(&snapshot);
                return Ok(());
            }
        }
        if snapshots.changed().await.is_err() {
            bail!("session stopped");
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();

    let mut rng = if let Some(s) = cli.seed {
        println!("Using fixed seed: {} (placement will be reproducible)", s);
        SmallRng::seed_from_u64(s)
    } else {
        let mut seed_rng = rand::rng();
        SmallRng::from_rng(&mut seed_rng)
    };
    let session_rng = SmallRng::seed_from_u64(rng.random());
    let handle = SessionHandle::spawn_with(Rules::default(), session_rng);

    match cli.command {
        Commands::Host { port } => {
            let addr = handle.start_host(port).await?;
            println!(
                "Hosting on {}. Share this address with your opponent; waiting...",
                addr
            );
        }
        Commands::Join { address, port } => {
            handle.join_game(&address, port).await?;
            let snapshot = handle
                .wait_for(|s| s.phase != Phase::Menu || s.status.starts_with("Connection failed"))
                .await?;
            if snapshot.phase == Phase::Menu {
                bail!("{}", snapshot.status);
            }
            println!("Connected to {}:{}", address, port);
        }
    }

    let result = if cli.auto {
        run_auto(&handle, &mut rng).await
    } else {
        run_interactive(&handle).await
    };
    handle.shutdown().await;
    result
}
