use std::sync::Arc;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[repr(u8)]
pub enum SquareKind {
    Wall = 0,
    Open = 1,
    Start = 2,
    Finish = 3,
}

impl SquareKind {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(SquareKind::Wall),
            1 => Some(SquareKind::Open),
            2 => Some(SquareKind::Start),
            3 => Some(SquareKind::Finish),
            _ => None,
        }
    }

    pub fn is_passable(self) -> bool {
        self != SquareKind::Wall
    }
}

/// Cardinal facing. Opposites differ by 2, turns wrap mod 4.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    North = 0,
    #[default]
    East = 1,
    South = 2,
    West = 3,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    pub fn from_index(index: i32) -> Self {
        match index.rem_euclid(4) {
            0 => Direction::North,
            1 => Direction::East,
            2 => Direction::South,
            _ => Direction::West,
        }
    }

    pub fn index(self) -> i32 {
        self as i32
    }

    /// Positive turns are clockwise.
    pub fn turn(self, quarter_turns: i32) -> Self {
        Self::from_index(self.index() + quarter_turns)
    }

    pub fn opposite(self) -> Self {
        self.turn(2)
    }

    /// Grid delta; y grows downwards.
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::North => (0, -1),
            Direction::East => (1, 0),
            Direction::South => (0, 1),
            Direction::West => (-1, 0),
        }
    }

    /// Index into the 16-step facing wheel used for animation.
    pub fn as_direction16(self) -> i32 {
        self.index() * 4
    }

    pub fn label(self) -> &'static str {
        match self {
            Direction::North => "north",
            Direction::East => "east",
            Direction::South => "south",
            Direction::West => "west",
        }
    }
}

/// Keep a 16-step facing value within 0..16, wrapping at both ends.
pub fn constrain_direction16(d: f32) -> u8 {
    let rounded = d.round() as i32;
    (((rounded % 16) + 16) % 16) as u8
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Serialize, Deserialize)]
pub struct Cell {
    pub x: i32,
    pub y: i32,
}

impl Cell {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn step(self, direction: Direction) -> Self {
        let (dx, dy) = direction.delta();
        Self::new(self.x + dx, self.y + dy)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
pub struct AgentPose {
    pub cell: Cell,
    pub facing: Direction,
}

impl AgentPose {
    pub fn new(cell: Cell, facing: Direction) -> Self {
        Self { cell, facing }
    }
}

/// Immutable maze layout. Exactly one start, at least one finish.
#[derive(Clone, Debug)]
pub struct Grid {
    width: usize,
    height: usize,
    squares: Vec<SquareKind>,
    start: Cell,
    finishes: Vec<Cell>,
}

impl Grid {
    pub fn from_rows(rows: &[Vec<u8>]) -> Result<Self, String> {
        let height = rows.len();
        let width = rows.first().map_or(0, Vec::len);
        if height == 0 || width == 0 {
            return Err("Maze must have at least one row and one column".to_string());
        }

        let mut squares = Vec::with_capacity(width * height);
        let mut start = None;
        let mut finishes = Vec::new();
        for (y, row) in rows.iter().enumerate() {
            if row.len() != width {
                return Err(format!(
                    "Maze row {} has {} columns, expected {}",
                    y,
                    row.len(),
                    width
                ));
            }
            for (x, &code) in row.iter().enumerate() {
                let kind = SquareKind::from_code(code).ok_or_else(|| {
                    format!("Unknown square code {} at ({}, {})", code, x, y)
                })?;
                let cell = Cell::new(x as i32, y as i32);
                match kind {
                    SquareKind::Start => {
                        if let Some(previous) = start.replace(cell) {
                            return Err(format!(
                                "Maze has more than one start: ({}, {}) and ({}, {})",
                                previous.x, previous.y, x, y
                            ));
                        }
                    }
                    SquareKind::Finish => finishes.push(cell),
                    SquareKind::Wall | SquareKind::Open => {}
                }
                squares.push(kind);
            }
        }

        let start = start.ok_or_else(|| "Maze has no start square".to_string())?;
        if finishes.is_empty() {
            return Err("Maze has no finish square".to_string());
        }

        Ok(Self {
            width,
            height,
            squares,
            start,
            finishes,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// `None` when the cell lies outside the grid.
    pub fn get(&self, cell: Cell) -> Option<SquareKind> {
        if cell.x < 0 || cell.y < 0 || cell.x >= self.width as i32 || cell.y >= self.height as i32 {
            return None;
        }
        Some(self.squares[cell.y as usize * self.width + cell.x as usize])
    }

    /// Off-grid and wall squares are both blocked.
    pub fn is_passable(&self, cell: Cell) -> bool {
        self.get(cell).is_some_and(SquareKind::is_passable)
    }

    pub fn start(&self) -> Cell {
        self.start
    }

    /// Finish cells in row-major scan order.
    pub fn finishes(&self) -> &[Cell] {
        &self.finishes
    }
}

/// Finish cells with one-shot consumption flags.
#[derive(Clone, Debug)]
pub struct FinishSet {
    cells: Vec<Cell>,
    consumed: Vec<bool>,
    remaining: usize,
}

impl FinishSet {
    pub fn new(cells: &[Cell]) -> Self {
        Self {
            cells: cells.to_vec(),
            consumed: vec![false; cells.len()],
            remaining: cells.len(),
        }
    }

    /// Consume the first unconsumed finish at `cell`. Returns its index.
    pub fn consume_at(&mut self, cell: Cell) -> Option<usize> {
        let index = self
            .cells
            .iter()
            .zip(&self.consumed)
            .position(|(finish, consumed)| *finish == cell && !consumed)?;
        self.consumed[index] = true;
        self.remaining -= 1;
        Some(index)
    }

    pub fn reset(&mut self) {
        self.consumed.iter_mut().for_each(|c| *c = false);
        self.remaining = self.cells.len();
    }

    pub fn remaining(&self) -> usize {
        self.remaining
    }

    pub fn all_consumed(&self) -> bool {
        self.remaining == 0
    }

    pub fn is_consumed(&self, index: usize) -> bool {
        self.consumed.get(index).copied().unwrap_or(false)
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Authoritative state for one execution run.
#[derive(Clone, Debug)]
pub struct WorldModel {
    grid: Arc<Grid>,
    pose: AgentPose,
    finishes: FinishSet,
}

impl WorldModel {
    pub fn new(grid: Arc<Grid>, start_direction: Direction) -> Self {
        let pose = AgentPose::new(grid.start(), start_direction);
        let finishes = FinishSet::new(grid.finishes());
        Self {
            grid,
            pose,
            finishes,
        }
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn pose(&self) -> AgentPose {
        self.pose
    }

    pub fn finishes(&self) -> &FinishSet {
        &self.finishes
    }

    pub fn is_path(&self, direction: Direction) -> bool {
        self.grid.is_passable(self.pose.cell.step(direction))
    }

    /// Move one cell. Refused, with the pose left untouched, when the path is blocked.
    pub fn move_agent(&mut self, direction: Direction) -> Result<Cell, String> {
        let target = self.pose.cell.step(direction);
        if !self.grid.is_passable(target) {
            return Err(format!(
                "Blocked moving {} from ({}, {})",
                direction.label(),
                self.pose.cell.x,
                self.pose.cell.y
            ));
        }
        self.pose.cell = target;
        Ok(target)
    }

    pub fn check_finish(&mut self) -> Option<usize> {
        self.finishes.consume_at(self.pose.cell)
    }

    pub fn remaining_finish_count(&self) -> usize {
        self.finishes.remaining()
    }

    pub fn all_finishes_consumed(&self) -> bool {
        self.finishes.all_consumed()
    }
}
