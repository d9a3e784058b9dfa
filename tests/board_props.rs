use battleship_lan::{Board, CellState, Coordinate, GameEngine, Orientation, ShipKind, GRID_SIZE};
use proptest::prelude::*;
use rand::{rngs::SmallRng, Rng, SeedableRng};

fn random_board(seed: u64) -> Board {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut board = Board::new();
    board.randomize_placement(&mut rng).unwrap();
    let shots = rng.random_range(0..60);
    for _ in 0..shots {
        let x = rng.random_range(0..GRID_SIZE);
        let y = rng.random_range(0..GRID_SIZE);
        board.receive_shot(Coordinate::new(x, y));
    }
    board
}

fn orientation() -> impl Strategy<Value = Orientation> {
    prop_oneof![Just(Orientation::Horizontal), Just(Orientation::Vertical)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn placement_accepted_iff_in_bounds_and_disjoint(
        seed in any::<u64>(),
        kind in prop::sample::select(ShipKind::ALL.to_vec()),
        x in 0..GRID_SIZE,
        y in 0..GRID_SIZE,
        orient in orientation(),
    ) {
        let mut rng = SmallRng::seed_from_u64(seed);
        let mut board = Board::new();
        let others: Vec<ShipKind> = ShipKind::ALL.into_iter().filter(|k| *k != kind).collect();
        board.randomize_fleet(&others, &mut rng).unwrap();
        let before = board.clone();

        let len = kind.length();
        let expected: Vec<(usize, usize)> = (0..len)
            .map(|i| match orient {
                Orientation::Horizontal => (x as usize + i, y as usize),
                Orientation::Vertical => (x as usize, y as usize + i),
            })
            .collect();
        let size = GRID_SIZE as usize;
        let in_bounds = expected.iter().all(|&(cx, cy)| cx < size && cy < size);
        let free = expected
            .iter()
            .filter(|&&(cx, cy)| cx < size && cy < size)
            .all(|&(cx, cy)| !board.ship_map().contains(Coordinate::new(cx as u8, cy as u8)));

        let result = board.place(kind, Coordinate::new(x, y), orient);
        prop_assert_eq!(result.is_ok(), in_bounds && free);
        if result.is_err() {
            prop_assert_eq!(board, before);
        } else {
            let ship = board.fleet().iter().find(|s| s.kind() == kind).unwrap();
            let mut cells: Vec<(usize, usize)> = ship
                .occupied_cells()
                .map(|c| (c.x as usize, c.y as usize))
                .collect();
            cells.sort_unstable();
            let mut want = expected.clone();
            want.sort_unstable();
            prop_assert_eq!(cells, want);
            prop_assert_eq!(board.ship_map().len(), before.ship_map().len() + len);
            for &(cx, cy) in &expected {
                let coord = Coordinate::new(cx as u8, cy as u8);
                prop_assert!(!before.ship_map().contains(coord));
                prop_assert_eq!(board.cell(coord), CellState::Ship);
            }
        }
    }

    #[test]
    fn second_shot_changes_nothing(seed in any::<u64>(), x in 0..GRID_SIZE, y in 0..GRID_SIZE) {
        let mut board = random_board(seed);
        let coord = Coordinate::new(x, y);
        board.receive_shot(coord);
        let after_first = board.clone();
        let again = board.receive_shot(coord);
        prop_assert!(!again.hit);
        prop_assert!(again.sunk.is_none());
        prop_assert_eq!(board, after_first);
    }

    #[test]
    fn sunk_ships_stay_sunk(seed in any::<u64>(), x in 0..GRID_SIZE, y in 0..GRID_SIZE) {
        let mut board = random_board(seed);
        let sunk_before: Vec<ShipKind> = board
            .fleet()
            .iter()
            .filter(|s| s.is_sunk())
            .map(|s| s.kind())
            .collect();
        board.receive_shot(Coordinate::new(x, y));
        for kind in sunk_before {
            let ship = board.fleet().iter().find(|s| s.kind() == kind).unwrap();
            prop_assert!(ship.is_sunk());
        }
    }

    #[test]
    fn target_grid_never_shows_ships(seed in any::<u64>()) {
        let mut rng = SmallRng::seed_from_u64(seed);
        let mut engine = GameEngine::new();
        engine.board_mut().randomize_placement(&mut rng).unwrap();
        let mut enemy = Board::new();
        enemy.randomize_placement(&mut rng).unwrap();
        for _ in 0..80 {
            let coord = Coordinate::new(rng.random_range(0..GRID_SIZE), rng.random_range(0..GRID_SIZE));
            let shot = enemy.receive_shot(coord);
            engine.record_outcome(coord, shot.hit, shot.sunk_kind());
        }
        for column in engine.target().cells() {
            prop_assert!(column.iter().all(|cell| *cell != CellState::Ship));
        }
    }
}
