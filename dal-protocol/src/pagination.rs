//! Pagination info carried by `list` responses.

use crate::record::Record;
use crate::tags;

/// Values of a `Pagination` record. Fields absent from the response, or not
/// numeric, are `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pagination {
    pub page: Option<u64>,
    pub num_per_page: Option<u64>,
    pub num_of_pages: Option<u64>,
    pub num_of_records: Option<u64>,
}

impl Pagination {
    /// Reads pagination values from a record; `None` if the record is empty.
    pub fn from_record(record: &Record) -> Option<Self> {
        if record.is_empty() {
            return None;
        }
        let num = |name: &str| record.get(name).and_then(|v| v.trim().parse().ok());
        Some(Self {
            page: num(tags::ATTR_PAGE),
            num_per_page: num(tags::ATTR_NUM_PER_PAGE),
            num_of_pages: num(tags::ATTR_NUM_OF_PAGES),
            num_of_records: num(tags::ATTR_NUM_OF_RECORDS),
        })
    }

    /// Returns whether a page after the current one exists.
    pub fn has_next_page(&self) -> bool {
        matches!((self.page, self.num_of_pages), (Some(page), Some(pages)) if page < pages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, &str)]) -> Record {
        let mut r = Record::new("u", tags::PAGINATION);
        for (k, v) in pairs {
            r.fields.insert(k.to_string(), v.to_string());
        }
        r
    }

    #[test]
    fn test_from_record() {
        let p = Pagination::from_record(&record(&[
            ("Page", "2"),
            ("NumPerPage", "50"),
            ("NumOfPages", "3"),
            ("NumOfRecords", "120"),
        ]))
        .unwrap();
        assert_eq!(p.page, Some(2));
        assert_eq!(p.num_per_page, Some(50));
        assert_eq!(p.num_of_pages, Some(3));
        assert_eq!(p.num_of_records, Some(120));
        assert!(p.has_next_page());
    }

    #[test]
    fn test_partial_and_empty() {
        assert_eq!(Pagination::from_record(&record(&[])), None);

        let p = Pagination::from_record(&record(&[("Page", "x"), ("NumOfPages", "1")])).unwrap();
        assert_eq!(p.page, None);
        assert_eq!(p.num_of_pages, Some(1));
        assert!(!p.has_next_page());
    }
}
