//! Translation of `/api/user/search` query parameters into a typed
//! [`ProductQuery`] that the product repository renders as SQL.

use serde::Deserialize;

/// Raw query string parameters, exactly as the client sends them.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct SearchParams {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<String>,
    pub sort: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Name,
    Description,
    Price,
    CreatedAt,
    UpdatedAt,
}

impl SortField {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "name" => Some(Self::Name),
            "description" => Some(Self::Description),
            "price" => Some(Self::Price),
            "createdAt" | "created_at" => Some(Self::CreatedAt),
            "updatedAt" | "updated_at" => Some(Self::UpdatedAt),
            _ => None,
        }
    }

    pub fn column(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Description => "description",
            Self::Price => "price",
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn sql(self) -> &'static str {
        match self {
            Self::Ascending => "ASC",
            Self::Descending => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub field: SortField,
    pub direction: SortDirection,
}

/// Case-insensitive substring filters (ANDed together) plus sort keys.
/// `None` filters impose no constraint.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ProductQuery {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<String>,
    pub sort: Vec<SortKey>,
}

impl ProductQuery {
    pub fn from_params(params: &SearchParams) -> Self {
        Self {
            name: non_blank(params.name.as_deref()),
            description: non_blank(params.description.as_deref()),
            price: non_blank(params.price.as_deref()),
            sort: params.sort.as_deref().map(parse_sort).unwrap_or_default(),
        }
    }

    /// Filters as `(column expression, needle)` pairs.
    pub fn filters(&self) -> Vec<(&'static str, &str)> {
        let mut filters = Vec::new();
        if let Some(name) = &self.name {
            filters.push(("name", name.as_str()));
        }
        if let Some(description) = &self.description {
            filters.push(("description", description.as_str()));
        }
        if let Some(price) = &self.price {
            filters.push(("CAST(price AS TEXT)", price.as_str()));
        }
        filters
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Parse `"-createdAt,price"` style sort specs. A leading `-` means
/// descending. Commas and whitespace both separate keys. Unknown and
/// repeated fields are skipped.
pub fn parse_sort(raw: &str) -> Vec<SortKey> {
    let mut keys: Vec<SortKey> = Vec::new();

    for token in raw
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
    {
        let (direction, name) = match token.strip_prefix('-') {
            Some(rest) => (SortDirection::Descending, rest),
            None => (
                SortDirection::Ascending,
                token.strip_prefix('+').unwrap_or(token),
            ),
        };

        let Some(field) = SortField::parse(name) else {
            tracing::debug!("Ignoring unknown sort field: {}", name);
            continue;
        };

        if keys.iter().any(|k| k.field == field) {
            continue;
        }
        keys.push(SortKey { field, direction });
    }

    keys
}

/// Build a LIKE pattern matching `needle` anywhere, with `\` as the
/// escape character for literal `%`, `_` and `\`.
pub fn like_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}
