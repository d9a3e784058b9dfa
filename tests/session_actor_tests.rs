use battleship_lan::transport::in_memory::InMemoryTransport;
use battleship_lan::{
    CellState, Coordinate, Orientation, Outcome, Phase, Rules, SessionError, SessionHandle,
    ShipKind,
};
use rand::rngs::SmallRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use tokio::time::{timeout, Duration};

const GAME_TIMEOUT: Duration = Duration::from_secs(30);

fn spawn(seed: u64) -> SessionHandle {
    SessionHandle::spawn_with(Rules::default(), SmallRng::seed_from_u64(seed))
}

/// Play until the game ends: fire at random unresolved cells, using the row
/// bomb whenever it is charged.
async fn autoplay(handle: SessionHandle, seed: u64) -> anyhow::Result<Outcome> {
    let mut rng = SmallRng::seed_from_u64(seed);
    handle.randomize_ships().await?;
    handle.confirm_placement().await?;
    loop {
        let snapshot = handle
            .wait_for(|s| s.phase == Phase::GameOver || (s.phase == Phase::Playing && s.is_local_turn))
            .await?;
        if snapshot.phase == Phase::GameOver {
            return snapshot
                .outcome
                .ok_or_else(|| anyhow::anyhow!("game over without an outcome"));
        }
        assert!(snapshot
            .target_grid
            .iter()
            .flatten()
            .all(|cell| *cell != CellState::Ship));
        if snapshot.can_use_row_bomb {
            handle.use_row_bomb(rng.random_range(0..10)).await?;
            continue;
        }
        let open: Vec<Coordinate> = Coordinate::all()
            .filter(|c| snapshot.target_grid[c.x as usize][c.y as usize] == CellState::Empty)
            .collect();
        let target = open
            .choose(&mut rng)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("no cells left"))?;
        handle.fire_shot(target.x, target.y).await?;
    }
}

async fn play_out(host: SessionHandle, joiner: SessionHandle) -> anyhow::Result<()> {
    let (host_outcome, joiner_outcome) = timeout(
        GAME_TIMEOUT,
        async { tokio::try_join!(autoplay(host.clone(), 11), autoplay(joiner.clone(), 12)) },
    )
    .await??;
    let mut outcomes = [host_outcome, joiner_outcome];
    outcomes.sort_by_key(|o| *o == Outcome::Lost);
    assert_eq!(outcomes, [Outcome::Won, Outcome::Lost]);

    let host_view = host.snapshot();
    let joiner_view = joiner.snapshot();
    assert_eq!(host_view.phase, Phase::GameOver);
    assert_eq!(joiner_view.phase, Phase::GameOver);
    let winner = if host_outcome == Outcome::Won {
        &host_view
    } else {
        &joiner_view
    };
    assert_eq!(winner.enemy_sunk.len(), ShipKind::ALL.len());
    host.shutdown().await;
    joiner.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_full_game_over_tcp() -> anyhow::Result<()> {
    let host = spawn(1);
    let joiner = spawn(2);
    let addr = host.start_host(0).await?;
    assert_eq!(host.snapshot().phase, Phase::Menu);
    joiner.join_game("127.0.0.1", addr.port()).await?;

    timeout(GAME_TIMEOUT, host.wait_for(|s| s.phase == Phase::Setup)).await??;
    timeout(GAME_TIMEOUT, joiner.wait_for(|s| s.phase == Phase::Setup)).await??;
    assert!(host.snapshot().is_host);
    assert!(!joiner.snapshot().is_host);

    play_out(host, joiner).await
}

#[tokio::test(flavor = "multi_thread")]
async fn test_full_game_in_memory() -> anyhow::Result<()> {
    let host = spawn(3);
    let joiner = spawn(4);
    let ((a_in, a_out), (b_in, b_out)) = InMemoryTransport::pair();
    host.attach(a_in, a_out, true).await?;
    joiner.attach(b_in, b_out, false).await?;
    assert_eq!(host.snapshot().phase, Phase::Setup);
    assert_eq!(joiner.snapshot().phase, Phase::Setup);

    play_out(host, joiner).await
}

#[tokio::test(flavor = "multi_thread")]
async fn test_commands_are_checked_by_the_actor() -> anyhow::Result<()> {
    let host = spawn(5);
    let joiner = spawn(6);
    let ((a_in, a_out), (b_in, b_out)) = InMemoryTransport::pair();

    // Placement may start before a connection exists.
    host.place_ship(ShipKind::Carrier, Coordinate::new(0, 0), Orientation::Vertical)
        .await?;
    assert_eq!(
        host.confirm_placement().await,
        Err(SessionError::WrongPhase(Phase::Menu))
    );
    assert_eq!(host.fire_shot(0, 0).await, Err(SessionError::WrongPhase(Phase::Menu)));

    host.attach(a_in, a_out, true).await?;
    joiner.attach(b_in, b_out, false).await?;
    let ((c_in, c_out), _) = InMemoryTransport::pair();
    assert_eq!(
        host.attach(c_in, c_out, true).await,
        Err(SessionError::WrongPhase(Phase::Setup))
    );
    assert_eq!(
        host.confirm_placement().await,
        Err(SessionError::FleetIncomplete(4))
    );
    assert_eq!(host.snapshot().unplaced.len(), 4);

    host.randomize_ships().await?;
    host.confirm_placement().await?;
    assert!(host.snapshot().local_ready);
    timeout(GAME_TIMEOUT, joiner.wait_for(|s| s.remote_ready)).await??;

    joiner.randomize_ships().await?;
    joiner.confirm_placement().await?;
    let view = timeout(
        GAME_TIMEOUT,
        host.wait_for(|s| s.phase == Phase::Playing),
    )
    .await??;
    assert!(view.is_local_turn);
    assert!(view.can_use_row_bomb);
    assert_eq!(joiner.fire_shot(0, 0).await, Err(SessionError::NotYourTurn));
    assert_eq!(
        host.fire_shot(10, 0).await,
        Err(SessionError::OutOfBounds(Coordinate::new(10, 0)))
    );

    host.use_row_bomb(4).await?;
    assert!(!host.snapshot().is_local_turn);
    let view = timeout(GAME_TIMEOUT, joiner.wait_for(|s| s.is_local_turn)).await??;
    assert_eq!(view.turn_counter, 1);

    joiner.fire_shot(0, 0).await?;
    let view = timeout(GAME_TIMEOUT, host.wait_for(|s| s.is_local_turn)).await??;
    assert_eq!(view.turn_counter, 1);
    assert_eq!(view.row_bomb_cooldown, 4);
    assert!(!view.can_use_row_bomb);
    assert_eq!(
        host.use_row_bomb(2).await,
        Err(SessionError::AbilityOnCooldown { remaining: 4 })
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_peer_shutdown_forces_game_over() -> anyhow::Result<()> {
    let host = spawn(7);
    let joiner = spawn(8);
    let ((a_in, a_out), (b_in, b_out)) = InMemoryTransport::pair();
    host.attach(a_in, a_out, true).await?;
    joiner.attach(b_in, b_out, false).await?;

    joiner.shutdown().await;
    assert_eq!(joiner.snapshot().outcome, Some(Outcome::Disconnected));
    assert_eq!(joiner.randomize_ships().await, Err(SessionError::Stopped));

    let view = timeout(GAME_TIMEOUT, host.wait_for(|s| s.phase == Phase::GameOver)).await??;
    assert_eq!(view.outcome, Some(Outcome::Disconnected));
    assert_eq!(view.status, "Disconnected.");
    host.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_dropping_tcp_peer_forces_game_over() -> anyhow::Result<()> {
    let host = spawn(9);
    let addr = host.start_host(0).await?;
    assert_eq!(
        host.start_host(0).await,
        Err(SessionError::AlreadyConnecting)
    );
    let peer = tokio::net::TcpStream::connect(("127.0.0.1", addr.port())).await?;
    timeout(GAME_TIMEOUT, host.wait_for(|s| s.phase == Phase::Setup)).await??;

    drop(peer);
    let view = timeout(GAME_TIMEOUT, host.wait_for(|s| s.phase == Phase::GameOver)).await??;
    assert_eq!(view.outcome, Some(Outcome::Disconnected));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_shutdown_releases_the_host_port() -> anyhow::Result<()> {
    let host = spawn(11);
    let addr = host.start_host(0).await?;
    assert!(!addr.ip().is_unspecified());
    assert!(host.snapshot().status.contains(&addr.to_string()));

    host.shutdown().await;
    drop(host);
    assert!(tokio::net::TcpStream::connect(("127.0.0.1", addr.port()))
        .await
        .is_err());
    let rebound = std::net::TcpListener::bind(("0.0.0.0", addr.port()))?;
    assert_eq!(rebound.local_addr()?.port(), addr.port());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_dropping_every_handle_releases_the_host_port() -> anyhow::Result<()> {
    let host = spawn(12);
    let port = host.start_host(0).await?.port();
    drop(host);

    let mut rebound = None;
    for _ in 0..100 {
        if let Ok(listener) = std::net::TcpListener::bind(("0.0.0.0", port)) {
            rebound = Some(listener);
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(rebound.is_some(), "port {} still bound", port);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_failed_join_stays_in_menu() -> anyhow::Result<()> {
    let unused = std::net::TcpListener::bind("127.0.0.1:0")?;
    let port = unused.local_addr()?.port();
    drop(unused);

    let joiner = spawn(10);
    joiner.join_game("127.0.0.1", port).await?;
    let view = timeout(
        GAME_TIMEOUT,
        joiner.wait_for(|s| s.status.starts_with("Connection failed")),
    )
    .await??;
    assert_eq!(view.phase, Phase::Menu);
    assert_eq!(view.outcome, None);
    Ok(())
}
