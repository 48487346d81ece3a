use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::debug;

static CATALOG_TABLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table.tablesorter").unwrap());
static ROW: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());

/// Undergraduate and graduate catalogs render the same section table with
/// different column offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogVariant {
    Undergraduate,
    Graduate,
}

impl CatalogVariant {
    pub fn layout(self) -> &'static TableLayout {
        match self {
            CatalogVariant::Undergraduate => &UNDERGRADUATE_LAYOUT,
            CatalogVariant::Graduate => &GRADUATE_LAYOUT,
        }
    }
}

/// Logical fields of a section table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Internal,
    Term,
    Campus,
    Mode,
    Instructor,
    Section,
    Session,
    Schedule,
    Enrollment,
    Location,
    Notes,
}

/// Field -> column index descriptor for one catalog variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableLayout {
    pub internal: usize,
    pub term: usize,
    pub campus: usize,
    pub mode: usize,
    pub instructor: usize,
    pub section: usize,
    pub session: usize,
    pub schedule: usize,
    pub enrollment: usize,
    pub location: usize,
    pub notes: usize,
}

pub const UNDERGRADUATE_LAYOUT: TableLayout = TableLayout {
    internal: 0,
    term: 1,
    campus: 2,
    mode: 3,
    instructor: 4,
    section: 5,
    session: 6,
    schedule: 7,
    enrollment: 9,
    location: 8,
    notes: 10,
};

pub const GRADUATE_LAYOUT: TableLayout = TableLayout {
    internal: 0,
    term: 1,
    campus: 3,
    mode: 4,
    instructor: 5,
    section: 6,
    session: 7,
    schedule: 8,
    enrollment: 9,
    location: 10,
    notes: 13,
};

impl TableLayout {
    pub const fn column(&self, field: Field) -> usize {
        match field {
            Field::Internal => self.internal,
            Field::Term => self.term,
            Field::Campus => self.campus,
            Field::Mode => self.mode,
            Field::Instructor => self.instructor,
            Field::Section => self.section,
            Field::Session => self.session,
            Field::Schedule => self.schedule,
            Field::Enrollment => self.enrollment,
            Field::Location => self.location,
            Field::Notes => self.notes,
        }
    }
}

/// A rendered table transposed into field-major columns: `columns[c][e]` is
/// the inner HTML of column `c` for entry (row) `e`. Entry 0 is the header row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PivotTable {
    columns: Vec<Vec<String>>,
    entries: usize,
}

impl PivotTable {
    /// Locate the catalog table in a full document.
    pub fn parse(html: &str) -> Option<Self> {
        let document = Html::parse_document(html);
        let table = document.select(&CATALOG_TABLE).next()?;
        Self::from_table(table)
    }

    pub fn from_table(table: ElementRef<'_>) -> Option<Self> {
        let rows: Vec<Vec<String>> = table
            .select(&ROW)
            .map(|row| {
                row.children()
                    .filter_map(ElementRef::wrap)
                    .filter(|cell| matches!(cell.value().name(), "td" | "th"))
                    .map(|cell| cell.inner_html().trim().to_string())
                    .collect()
            })
            .collect();

        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        if width == 0 {
            return None;
        }

        let columns = (0..width)
            .map(|c| {
                rows.iter()
                    .map(|row| row.get(c).cloned().unwrap_or_default())
                    .collect()
            })
            .collect();

        debug!("Parsed table: {} columns x {} entries", width, rows.len());
        Some(Self {
            columns,
            entries: rows.len(),
        })
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn entry_count(&self) -> usize {
        self.entries
    }

    pub fn column(&self, index: usize) -> Option<&[String]> {
        self.columns.get(index).map(Vec::as_slice)
    }

    /// Cell value, or `""` when the column or entry is out of range.
    pub fn cell(&self, column: usize, entry: usize) -> &str {
        self.columns
            .get(column)
            .and_then(|c| c.get(entry))
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// A section table bound to the layout of its catalog variant.
#[derive(Debug, Clone)]
pub struct SectionTable {
    variant: CatalogVariant,
    layout: &'static TableLayout,
    table: PivotTable,
}

impl SectionTable {
    pub fn new(table: PivotTable, variant: CatalogVariant) -> Self {
        Self {
            variant,
            layout: variant.layout(),
            table,
        }
    }

    pub fn variant(&self) -> CatalogVariant {
        self.variant
    }

    pub fn entry_count(&self) -> usize {
        self.table.entry_count()
    }

    pub fn cell(&self, field: Field, entry: usize) -> &str {
        self.table.cell(self.layout.column(field), entry)
    }

    pub fn field(&self, field: Field) -> &[String] {
        self.table.column(self.layout.column(field)).unwrap_or(&[])
    }
}

/// Extract the section table from a catalog page. `None` when the page has no
/// catalog table or the table has no columns.
pub fn extract(html: &str, variant: CatalogVariant) -> Option<SectionTable> {
    PivotTable::parse(html).map(|table| SectionTable::new(table, variant))
}
