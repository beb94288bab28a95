//! Well-known tag and attribute names in server responses.

pub const ERROR: &str = "Error";

pub const RECORD_META: &str = "RecordMeta";
pub const ATTR_TAG_NAME: &str = "TagName";

pub const USER: &str = "User";
pub const ATTR_USER_ID: &str = "UserId";

pub const WRITE_TOKEN: &str = "WriteToken";
pub const ATTR_VALUE: &str = "Value";

pub const INFO: &str = "Info";
pub const ATTR_GROUP_NAME: &str = "GroupName";
pub const ATTR_GADMIN: &str = "GAdmin";

pub const SYSTEM_GROUP: &str = "SystemGroup";
pub const ATTR_SYSTEM_GROUP_ID: &str = "SystemGroupId";

pub const PAGINATION: &str = "Pagination";
pub const ATTR_PAGE: &str = "Page";
pub const ATTR_NUM_PER_PAGE: &str = "NumPerPage";
pub const ATTR_NUM_OF_PAGES: &str = "NumOfPages";
pub const ATTR_NUM_OF_RECORDS: &str = "NumOfRecords";

pub const RETURN_ID: &str = "ReturnId";
pub const RETURN_ID_FILE: &str = "ReturnIdFile";
pub const ATTR_XML: &str = "xml";

/// Tag of every CSV record.
pub const CSV_DATA: &str = "csvdata";
/// Field holding the raw line of a CSV record read without headings.
pub const CSV_LINE: &str = "csvline";
