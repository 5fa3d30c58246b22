use std::cmp::Ordering;

use crate::error::TableError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    fn apply(self, ord: Ordering) -> Ordering {
        match self {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compare {
    Text,
    /// Cells parsed as numbers; unparsable cells sort after numeric ones in
    /// either direction.
    Numeric,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortColumn {
    pub column: usize,
    pub order: SortOrder,
    pub compare: Compare,
}

impl SortColumn {
    pub const fn asc(column: usize) -> Self {
        Self {
            column,
            order: SortOrder::Asc,
            compare: Compare::Text,
        }
    }

    pub const fn numeric_desc(column: usize) -> Self {
        Self {
            column,
            order: SortOrder::Desc,
            compare: Compare::Numeric,
        }
    }
}

/// Row ordering for one resource kind.
///
/// `Columns` is followed by a whole-row comparison, so the final order never
/// depends on the order the data source returned objects in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortKey {
    /// Keep rows in the order the collector produced them.
    Preserve,
    Columns(Vec<SortColumn>),
}

impl SortKey {
    pub fn by_name() -> Self {
        SortKey::Columns(vec![SortColumn::asc(0)])
    }

    /// Name in column 0, namespace in column 1.
    pub fn by_name_then_namespace() -> Self {
        SortKey::Columns(vec![SortColumn::asc(0), SortColumn::asc(1)])
    }

    fn compare(&self, a: &[String], b: &[String]) -> Ordering {
        let SortKey::Columns(columns) = self else {
            return Ordering::Equal;
        };
        columns
            .iter()
            .map(|col| {
                let left = a.get(col.column).map(String::as_str).unwrap_or_default();
                let right = b.get(col.column).map(String::as_str).unwrap_or_default();
                match col.compare {
                    Compare::Text => col.order.apply(left.cmp(right)),
                    Compare::Numeric => numeric_cmp(left, right, col.order),
                }
            })
            .find(|ord| ord.is_ne())
            .unwrap_or_else(|| a.cmp(b))
    }
}

fn numeric_cmp(a: &str, b: &str, order: SortOrder) -> Ordering {
    match (a.trim().parse::<f64>(), b.trim().parse::<f64>()) {
        (Ok(x), Ok(y)) => order.apply(x.total_cmp(&y)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => order.apply(a.cmp(b)),
    }
}

/// How the paginated sink divides the printable width between columns.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ColumnWidths {
    #[default]
    Equal,
    /// Widths in millimetres, one per column.
    Fixed(Vec<f64>),
}

/// Header plus pre-formatted string rows, shared by every renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordTable {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
    widths: ColumnWidths,
}

impl RecordTable {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
            widths: ColumnWidths::Equal,
        }
    }

    pub fn with_widths(mut self, widths: ColumnWidths) -> Self {
        self.widths = widths;
        self
    }

    pub fn push_row(&mut self, row: Vec<String>) -> Result<(), TableError> {
        if row.len() != self.columns.len() {
            return Err(TableError::RowShape {
                expected: self.columns.len(),
                got: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn sort_by_key(&mut self, key: &SortKey) {
        if matches!(key, SortKey::Preserve) {
            return;
        }
        self.rows.sort_by(|a, b| key.compare(a, b));
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn widths(&self) -> &ColumnWidths {
        &self.widths
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
