// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use curio_app::{KindId, Piece, PieceId};
use std::path::PathBuf;
use time::{Date, Month, OffsetDateTime, Time};

const KINDS: [&str; 8] = [
    "Badges",
    "Coins",
    "Figurines",
    "Fossils",
    "Minerals",
    "Postcards",
    "Shells",
    "Stamps",
];

const MINERAL_TITLES: [&str; 10] = [
    "Banded Agate",
    "Desert Rose",
    "Pyrite Cluster",
    "Amethyst Point",
    "Smoky Quartz",
    "Malachite Slab",
    "Fluorite Octahedron",
    "Tigers Eye",
    "Rose Quartz",
    "Black Tourmaline",
];

const COIN_TITLES: [&str; 8] = [
    "Silver Denarius",
    "Wheat Penny",
    "Trade Dollar",
    "Buffalo Nickel",
    "Mercury Dime",
    "Large Cent",
    "Half Crown",
    "Ducat",
];

const FOSSIL_TITLES: [&str; 8] = [
    "Trilobite",
    "Ammonite Half",
    "Shark Tooth",
    "Fern Imprint",
    "Crinoid Stem",
    "Orthoceras",
    "Petrified Wood",
    "Raptor Claw Cast",
];

const GENERIC_TITLES: [&str; 10] = [
    "Enamel Badge",
    "Porcelain Figure",
    "Harbor Postcard",
    "Conch Shell",
    "Airmail Stamp",
    "Brass Token",
    "Carved Netsuke",
    "Pressed Flower Card",
    "Cowrie Shell",
    "Jubilee Stamp",
];

const ORIGINS: [&str; 12] = [
    "Brazil",
    "Morocco",
    "Tunisia",
    "Peru",
    "Uruguay",
    "Madagascar",
    "Japan",
    "Portugal",
    "Iceland",
    "Kenya",
    "Vietnam",
    "Mexico",
];

const NOTE_WORDS: [&str; 16] = [
    "chipped",
    "polished",
    "gift",
    "estate",
    "auction",
    "trade",
    "display",
    "fragile",
    "labeled",
    "authenticated",
    "duplicate",
    "favorite",
    "restored",
    "boxed",
    "loose",
    "uncatalogued",
];

const REFERENCE_YEAR: i32 = 2026;

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }

    fn bool(&mut self) -> bool {
        (self.next_u64() & 1) == 1
    }
}

/// Fields a store insert needs; the store assigns the id and token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakePiece {
    pub title: String,
    pub origin: String,
    pub year: Option<i32>,
    pub notes: String,
    pub acquired_on: Option<Date>,
}

#[derive(Debug, Clone)]
pub struct CabinetFaker {
    rng: DeterministicRng,
    seed: u64,
    serial: u64,
}

impl CabinetFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
            seed: normalized,
            serial: 0,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn int_n(&mut self, n: usize) -> usize {
        self.rng.int_n(n)
    }

    pub fn piece(&mut self, kind_name: &str) -> FakePiece {
        let title = match kind_name {
            "Minerals" => self.pick(&MINERAL_TITLES),
            "Coins" => self.pick(&COIN_TITLES),
            "Fossils" => self.pick(&FOSSIL_TITLES),
            _ => self.pick(&GENERIC_TITLES),
        };
        self.serial += 1;
        FakePiece {
            // Serial suffix keeps titles unique across a large batch.
            title: format!("{title} #{}", self.serial),
            origin: self.pick(&ORIGINS).to_owned(),
            year: self
                .rng
                .bool()
                .then(|| REFERENCE_YEAR - 20 - self.rng.int_n(120) as i32),
            notes: if self.rng.bool() {
                self.note()
            } else {
                String::new()
            },
            acquired_on: self.rng.bool().then(|| self.date_in_recent_years()),
        }
    }

    /// A ready-made in-memory [`Piece`] for engine-level tests that never
    /// touch a store; tokens are derived from the serial so they stay unique
    /// and stable per faker instance.
    pub fn loose_piece(&mut self, kind_id: KindId) -> Piece {
        let fake = self.piece("Minerals");
        self.serial += 1;
        Piece {
            id: PieceId::new(self.serial as i64),
            token: format!("tk-{:06x}", self.serial * 7 + self.seed),
            kind_id,
            title: fake.title,
            origin: fake.origin,
            year: fake.year,
            notes: fake.notes,
            acquired_on: fake.acquired_on,
            created_at: reference_now(),
            updated_at: reference_now(),
        }
    }

    fn note(&mut self) -> String {
        let count = 2 + self.rng.int_n(3);
        let mut parts = Vec::with_capacity(count);
        for _ in 0..count {
            parts.push(self.pick(&NOTE_WORDS).to_owned());
        }
        let mut note = parts.join(" ");
        if let Some(first) = note.get_mut(0..1) {
            first.make_ascii_uppercase();
        }
        note
    }

    fn date_in_recent_years(&mut self) -> Date {
        let year = REFERENCE_YEAR - 1 - self.rng.int_n(10) as i32;
        let month = Month::try_from(1 + self.rng.int_n(12) as u8).expect("valid month");
        let day = 1 + self.rng.int_n(28) as u8;
        Date::from_calendar_date(year, month, day).expect("valid calendar date")
    }

    fn pick<'a>(&mut self, items: &'a [&'a str]) -> &'a str {
        items[self.rng.int_n(items.len())]
    }
}

pub fn temp_db_path() -> Result<(tempfile::TempDir, PathBuf)> {
    let dir = tempfile::tempdir().context("create temp dir")?;
    let db_path = dir.path().join("curio.db");
    Ok((dir, db_path))
}

pub fn fixture_datetime() -> &'static str {
    "2026-02-19T12:34:56Z"
}

pub fn kinds() -> &'static [&'static str] {
    &KINDS
}

fn reference_now() -> OffsetDateTime {
    let date = Date::from_calendar_date(REFERENCE_YEAR, Month::January, 1).expect("valid date");
    let midnight = Time::from_hms(0, 0, 0).expect("valid midnight");
    date.with_time(midnight).assume_utc()
}

#[cfg(test)]
mod tests {
    use super::CabinetFaker;
    use curio_app::KindId;

    #[test]
    fn same_seed_yields_same_pieces() {
        let mut left = CabinetFaker::new(42);
        let mut right = CabinetFaker::new(42);

        for _ in 0..8 {
            assert_eq!(left.piece("Minerals"), right.piece("Minerals"));
        }
    }

    #[test]
    fn zero_seed_is_normalized() {
        let faker = CabinetFaker::new(0);
        assert_eq!(faker.seed(), 1);
    }

    #[test]
    fn loose_pieces_have_unique_tokens() {
        let mut faker = CabinetFaker::new(7);
        let first = faker.loose_piece(KindId::new(1));
        let second = faker.loose_piece(KindId::new(1));
        assert_ne!(first.token, second.token);
    }
}
