// CamTrawl Metadata Constants
// These names are shared with the acquisition software. Do not change them without
// updating the acquisition side as well.

// Paths (relative to the deployment directory)
pub const LOGS_FOLDER: &str = "logs";
pub const IMAGES_FOLDER: &str = "images";
pub const DB_FILENAME: &str = "CamTrawlMetadata.db3";
pub const ATTITUDE_LOG_FILENAME: &str = "attitude.log";

// Deployment parameters (deployment_data table)
pub const PARAM_HOURS_OFFSET_TO_UTC: &str = "hours_offset_to_utc";
pub const PARAM_IMAGE_FILE_TYPE: &str = "image_file_type";
pub const MAX_UTC_OFFSET_HOURS: f64 = 24.0;
pub const ADJUSTMENTS_PARAM_SUFFIX: &str = "_adjustments";

// Image files probed when image_file_type is not recorded, in probe order
pub const IMAGE_EXTENSIONS: [&str; 4] = [".jpg", ".jpeg", ".tif", ".tiff"];

// Timestamps as stored by the acquisition software
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";
pub const TIMESTAMP_PARSE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";
pub const WINDOW_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// Query window used when no start/end time is given
pub const WINDOW_START_DEFAULT: &str = "1900-01-01 01:00:00";
pub const WINDOW_END_DEFAULT: &str = "2999-01-01 01:00:00";

// Sensors on standard CamTrawl systems
pub const DEPTH_SENSOR_ID: &str = "CTControl";
pub const ATTITUDE_HEADER: &str = "$OHPR";
pub const DEPTH_FIELD_INDEX: usize = 5;
pub const DEFAULT_FIELD_SEPARATOR: &str = ",";
pub const LOCATION_SENSOR_ID: &str = "GPS";

// Legacy conversion
pub const NULL_MAC_ADDRESS: &str = "00-00-00-00-00-00";
pub const LEGACY_EXPOSURE_US: i64 = -1;
pub const LEGACY_TEMPERATURE: &str = "-999.0";

// CSV export
pub const CSV_LINE_END: &str = "\r\n";
pub const CAMERAS_CSV_SUFFIX: &str = "cameras.csv";
pub const IMAGES_CSV_SUFFIX: &str = "images.csv";
pub const ATTITUDE_CSV_SUFFIX: &str = "OHPR.csv";
