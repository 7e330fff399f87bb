// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod validation;

use anyhow::{Context, Result, anyhow, bail};
use curio_app::{KindId, OrderWriter, Piece, PieceId, ShelfKind, WriteRequest};
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::BTreeSet;
use std::env;
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime};

use validation::{validate_kind_ref, validate_title, validate_year};

pub const APP_NAME: &str = "curio";

const DEFAULT_KINDS: [&str; 8] = [
    "Badges",
    "Coins",
    "Figurines",
    "Fossils",
    "Minerals",
    "Postcards",
    "Shells",
    "Stamps",
];

const REQUIRED_SCHEMA: &[(&str, &[&str])] = &[
    ("kinds", &["id", "name", "created_at", "updated_at"]),
    (
        "pieces",
        &[
            "id",
            "token",
            "kind_id",
            "title",
            "origin",
            "year",
            "notes",
            "acquired_on",
            "position",
            "created_at",
            "updated_at",
        ],
    ),
    ("catalog_state", &["id", "saved_at"]),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RequiredIndex {
    name: &'static str,
    create_sql: &'static str,
}

const REQUIRED_INDEXES: &[RequiredIndex] = &[
    RequiredIndex {
        name: "idx_kinds_name",
        create_sql: "CREATE UNIQUE INDEX IF NOT EXISTS idx_kinds_name ON kinds (name);",
    },
    RequiredIndex {
        name: "idx_pieces_token",
        create_sql: "CREATE UNIQUE INDEX IF NOT EXISTS idx_pieces_token ON pieces (token);",
    },
    RequiredIndex {
        name: "idx_pieces_kind_id",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_pieces_kind_id ON pieces (kind_id);",
    },
    RequiredIndex {
        name: "idx_pieces_kind_position",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_pieces_kind_position ON pieces (kind_id, position);",
    },
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPiece {
    pub kind_id: KindId,
    pub title: String,
    pub origin: String,
    pub year: Option<i32>,
    pub notes: String,
    pub acquired_on: Option<Date>,
}

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let printable = path.to_string_lossy().to_string();
        validate_db_path(&printable)?;
        let conn = Connection::open(path)
            .with_context(|| format!("open database at {}", path.display()))?;
        configure_connection(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory database")?;
        configure_connection(&conn)?;
        Ok(Self { conn })
    }

    pub fn raw_connection(&self) -> &Connection {
        &self.conn
    }

    pub fn bootstrap(&self) -> Result<()> {
        if has_user_tables(&self.conn)? {
            validate_schema(&self.conn)?;
        } else {
            self.conn
                .execute_batch(include_str!("sql/schema.sql"))
                .context("create schema")?;
        }

        ensure_required_indexes(&self.conn)?;

        self.seed_defaults()?;
        Ok(())
    }

    pub fn seed_defaults(&self) -> Result<()> {
        for kind in DEFAULT_KINDS {
            self.conn
                .execute(
                    "INSERT OR IGNORE INTO kinds (name) VALUES (?)",
                    params![kind],
                )
                .with_context(|| format!("insert default kind {kind}"))?;
        }
        Ok(())
    }

    pub fn list_kinds(&self) -> Result<Vec<ShelfKind>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, created_at, updated_at FROM kinds ORDER BY name ASC")
            .context("prepare kinds query")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .context("query kinds")?;

        let raw = rows
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("collect kinds")?;
        raw.into_iter()
            .map(|(id, name, created_at, updated_at)| {
                Ok(ShelfKind {
                    id: KindId::new(id),
                    name,
                    created_at: parse_datetime(&created_at)?,
                    updated_at: parse_datetime(&updated_at)?,
                })
            })
            .collect()
    }

    pub fn create_kind(&self, name: &str) -> Result<KindId> {
        if name.trim().is_empty() {
            bail!("kind name must not be empty");
        }
        self.conn
            .execute("INSERT INTO kinds (name) VALUES (?)", params![name])
            .with_context(|| format!("insert kind {name}"))?;
        Ok(KindId::new(self.conn.last_insert_rowid()))
    }

    /// Pieces of one shelf in canonical display order. `position` is the
    /// persisted order; the rowid tiebreaker keeps freshly inserted pieces
    /// deterministic before their first order write.
    pub fn list_pieces(&self, kind_id: KindId) -> Result<Vec<Piece>> {
        let mut stmt = self
            .conn
            .prepare(
                "
                SELECT
                  id, token, kind_id, title, origin, year,
                  notes, acquired_on, created_at, updated_at
                FROM pieces
                WHERE kind_id = ?
                ORDER BY position ASC, id ASC
                ",
            )
            .context("prepare pieces query")?;
        let rows = stmt
            .query_map(params![kind_id.get()], raw_piece_row)
            .context("query pieces")?;

        let raw = rows
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("collect pieces")?;
        raw.into_iter().map(RawPiece::into_piece).collect()
    }

    pub fn get_piece_by_token(&self, token: &str) -> Result<Option<Piece>> {
        let raw = self
            .conn
            .query_row(
                "
                SELECT
                  id, token, kind_id, title, origin, year,
                  notes, acquired_on, created_at, updated_at
                FROM pieces
                WHERE token = ?
                ",
                params![token],
                raw_piece_row,
            )
            .optional()
            .with_context(|| format!("query piece by token {token}"))?;
        raw.map(RawPiece::into_piece).transpose()
    }

    /// Insert a piece at the bottom of its shelf. The stable token is
    /// assigned by the schema default and never reused; the inserted row is
    /// read back so callers get the token without a second round trip.
    pub fn create_piece(&self, new_piece: &NewPiece) -> Result<Piece> {
        validate_title(&new_piece.title).context("validate piece title")?;
        validate_year(new_piece.year).context("validate piece year")?;
        validate_kind_ref(new_piece.kind_id.get()).context("validate piece kind")?;

        let now = now_rfc3339()?;
        self.conn
            .execute(
                "
                INSERT INTO pieces (
                  kind_id, title, origin, year, notes, acquired_on,
                  position, created_at, updated_at
                ) VALUES (
                  ?, ?, ?, ?, ?, ?,
                  (SELECT COALESCE(MAX(position), -1) + 1 FROM pieces WHERE kind_id = ?),
                  ?, ?
                )
                ",
                params![
                    new_piece.kind_id.get(),
                    new_piece.title,
                    new_piece.origin,
                    new_piece.year,
                    new_piece.notes,
                    new_piece.acquired_on.map(format_date),
                    new_piece.kind_id.get(),
                    now,
                    now,
                ],
            )
            .context("insert piece")?;

        let id = PieceId::new(self.conn.last_insert_rowid());
        self.get_piece(id)
    }

    pub fn get_piece(&self, piece_id: PieceId) -> Result<Piece> {
        let raw = self
            .conn
            .query_row(
                "
                SELECT
                  id, token, kind_id, title, origin, year,
                  notes, acquired_on, created_at, updated_at
                FROM pieces
                WHERE id = ?
                ",
                params![piece_id.get()],
                raw_piece_row,
            )
            .with_context(|| format!("query piece {}", piece_id.get()))?;
        raw.into_piece()
    }

    pub fn delete_piece(&self, piece_id: PieceId) -> Result<()> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM pieces WHERE id = ?", params![piece_id.get()])
            .context("delete piece")?;
        if rows_affected == 0 {
            bail!(
                "piece {} not found -- it may already be deleted",
                piece_id.get()
            );
        }
        Ok(())
    }

    /// Persist a canonical shelf order: position 0..n assigned in token
    /// order, in one transaction. Tokens that no longer exist are skipped
    /// rather than failing the write, so a delete racing a debounced order
    /// write cannot wedge the flush.
    pub fn save_shelf_order(&self, kind_id: KindId, order: &[String]) -> Result<()> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("begin order transaction")?;
        let now = now_rfc3339()?;
        for (position, token) in order.iter().enumerate() {
            tx.execute(
                "
                UPDATE pieces
                SET position = ?, updated_at = ?
                WHERE token = ? AND kind_id = ?
                ",
                params![position as i64, now, token, kind_id.get()],
            )
            .with_context(|| format!("write position for piece {token}"))?;
        }
        tx.commit().context("commit order transaction")
    }

    pub fn mark_catalog_saved(&self) -> Result<()> {
        let now = now_rfc3339()?;
        self.conn
            .execute(
                "UPDATE catalog_state SET saved_at = ? WHERE id = 1",
                params![now],
            )
            .context("mark catalog saved")?;
        Ok(())
    }

    pub fn catalog_saved_at(&self) -> Result<Option<OffsetDateTime>> {
        let raw: Option<String> = self
            .conn
            .query_row("SELECT saved_at FROM catalog_state WHERE id = 1", [], |row| {
                row.get(0)
            })
            .context("query catalog save time")?;
        parse_opt_datetime(raw)
    }

    pub fn seed_demo_data(&self) -> Result<()> {
        let kinds = self.list_kinds()?;
        let demo: [(&str, &[(&str, &str, Option<i32>)]); 3] = [
            (
                "Minerals",
                &[
                    ("Banded Agate", "Brazil", None),
                    ("Desert Rose", "Tunisia", None),
                    ("Pyrite Cluster", "Peru", None),
                    ("Amethyst Point", "Uruguay", None),
                ],
            ),
            (
                "Coins",
                &[
                    ("Silver Denarius", "Rome", Some(1887)),
                    ("Wheat Penny", "United States", Some(1943)),
                    ("Trade Dollar", "Hong Kong", Some(1900)),
                ],
            ),
            (
                "Fossils",
                &[
                    ("Trilobite", "Morocco", None),
                    ("Ammonite Half", "Madagascar", None),
                    ("Shark Tooth", "Florida", None),
                ],
            ),
        ];

        for (kind_name, pieces) in demo {
            let Some(kind) = kinds.iter().find(|kind| kind.name == kind_name) else {
                continue;
            };
            for (title, origin, year) in pieces.iter().copied() {
                self.create_piece(&NewPiece {
                    kind_id: kind.id,
                    title: title.to_owned(),
                    origin: origin.to_owned(),
                    year,
                    notes: String::new(),
                    acquired_on: None,
                })?;
            }
        }
        Ok(())
    }
}

impl OrderWriter for Store {
    fn write(&mut self, request: &WriteRequest) -> Result<()> {
        match request {
            WriteRequest::ShelfOrder { kind_id, order } => self.save_shelf_order(*kind_id, order),
        }
    }

    fn write_catalog(&mut self) -> Result<()> {
        self.mark_catalog_saved()
    }
}

pub fn default_db_path() -> Result<PathBuf> {
    if let Some(path) = env::var_os("CURIO_DB_PATH") {
        return Ok(PathBuf::from(path));
    }

    let data_root = dirs::data_dir()
        .ok_or_else(|| anyhow!("cannot resolve data directory; set CURIO_DB_PATH to the database file"))?;
    Ok(data_root.join(APP_NAME).join("curio.db"))
}

pub fn validate_db_path(path: &str) -> Result<()> {
    if path.is_empty() {
        bail!("database path must not be empty");
    }
    if path == ":memory:" {
        return Ok(());
    }

    if let Some(index) = path.find("://")
        && index > 0
    {
        let scheme = &path[..index];
        if scheme.chars().all(char::is_alphabetic) {
            bail!(
                "database path {path:?} looks like a URI ({scheme}://); pass a filesystem path instead"
            );
        }
    }

    if path.starts_with("file:") {
        bail!("database path {path:?} uses file: URI syntax; pass a plain filesystem path");
    }

    if path.contains('?') {
        bail!(
            "database path {path:?} contains '?'; remove query parameters and use a plain file path"
        );
    }

    Ok(())
}

#[derive(Debug)]
struct RawPiece {
    id: i64,
    token: String,
    kind_id: i64,
    title: String,
    origin: String,
    year: Option<i32>,
    notes: String,
    acquired_on: Option<String>,
    created_at: String,
    updated_at: String,
}

impl RawPiece {
    fn into_piece(self) -> Result<Piece> {
        Ok(Piece {
            id: PieceId::new(self.id),
            token: self.token,
            kind_id: KindId::new(self.kind_id),
            title: self.title,
            origin: self.origin,
            year: self.year,
            notes: self.notes,
            acquired_on: parse_opt_date(self.acquired_on)?,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

fn raw_piece_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawPiece> {
    Ok(RawPiece {
        id: row.get(0)?,
        token: row.get(1)?,
        kind_id: row.get(2)?,
        title: row.get(3)?,
        origin: row.get(4)?,
        year: row.get(5)?,
        notes: row.get(6)?,
        acquired_on: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

fn has_user_tables(conn: &Connection) -> Result<bool> {
    let count: i64 = conn
        .query_row(
            "
            SELECT COUNT(*)
            FROM sqlite_master
            WHERE type = 'table'
              AND name NOT LIKE 'sqlite_%'
            ",
            [],
            |row| row.get(0),
        )
        .context("count user tables")?;
    Ok(count > 0)
}

fn validate_schema(conn: &Connection) -> Result<()> {
    for (table, required_columns) in REQUIRED_SCHEMA {
        if !table_exists(conn, table)? {
            bail!(
                "database is missing required table `{table}`; use a curio-compatible database or migrate first"
            );
        }

        let columns = table_columns(conn, table)?;
        let missing: Vec<&str> = required_columns
            .iter()
            .copied()
            .filter(|column| !columns.contains(*column))
            .collect();

        if !missing.is_empty() {
            bail!(
                "table `{table}` is missing required columns: {}; run migration before launching",
                missing.join(", ")
            );
        }
    }

    Ok(())
}

fn ensure_required_indexes(conn: &Connection) -> Result<()> {
    for index in REQUIRED_INDEXES {
        conn.execute_batch(index.create_sql)
            .with_context(|| format!("ensure required index `{}`", index.name))?;
    }

    let existing_indexes = index_names(conn)?;
    let missing = REQUIRED_INDEXES
        .iter()
        .filter(|index| !existing_indexes.contains(index.name))
        .map(|index| index.name)
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        bail!(
            "database is missing required indexes: {}; run migration before launching",
            missing.join(", ")
        );
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let exists = conn
        .query_row(
            "
            SELECT EXISTS(
              SELECT 1
              FROM sqlite_master
              WHERE type = 'table' AND name = ?
            )
            ",
            params![table],
            |row| row.get::<_, i64>(0),
        )
        .with_context(|| format!("check table existence for {table}"))?;
    Ok(exists == 1)
}

fn table_columns(conn: &Connection, table: &str) -> Result<BTreeSet<String>> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({table})"))
        .with_context(|| format!("inspect columns for {table}"))?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .with_context(|| format!("query column info for {table}"))?;

    let names = rows
        .collect::<rusqlite::Result<BTreeSet<_>>>()
        .with_context(|| format!("collect columns for {table}"))?;
    Ok(names)
}

fn index_names(conn: &Connection) -> Result<BTreeSet<String>> {
    let mut stmt = conn
        .prepare(
            "
            SELECT name
            FROM sqlite_master
            WHERE type = 'index'
              AND name NOT LIKE 'sqlite_%'
            ORDER BY name ASC
            ",
        )
        .context("prepare index names query")?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .context("query index names")?;
    rows.collect::<rusqlite::Result<BTreeSet<_>>>()
        .context("collect index names")
}

fn configure_connection(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
        ",
    )
    .context("configure sqlite pragmas")
}

fn now_rfc3339() -> Result<String> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .context("format current timestamp")
}

fn parse_datetime(raw: &str) -> Result<OffsetDateTime> {
    if let Ok(value) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Ok(value);
    }

    if let Ok(value) = PrimitiveDateTime::parse(
        raw,
        &format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    ) {
        return Ok(value.assume_utc());
    }

    if let Ok(value) = PrimitiveDateTime::parse(
        raw,
        &format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    ) {
        return Ok(value.assume_utc());
    }

    bail!("unsupported datetime format {raw:?}")
}

fn parse_date(raw: &str) -> Result<Date> {
    if let Ok(value) = Date::parse(raw, &format_description!("[year]-[month]-[day]")) {
        return Ok(value);
    }

    // Tolerate full timestamps left behind by other writers; normalize to date.
    let date_time = parse_datetime(raw)?;
    Ok(date_time.date())
}

fn parse_opt_datetime(raw: Option<String>) -> Result<Option<OffsetDateTime>> {
    raw.as_deref().map(parse_datetime).transpose()
}

fn parse_opt_date(raw: Option<String>) -> Result<Option<Date>> {
    raw.as_deref().map(parse_date).transpose()
}

fn format_date(value: Date) -> String {
    value
        .format(&format_description!("[year]-[month]-[day]"))
        .unwrap_or_else(|_| "1970-01-01".to_owned())
}
