//! # Constants
//!
//! Names, labels and defaults shared across the controller.

/// API group of the `Site` and `Page` resources
pub const API_GROUP: &str = "webhost.microscaler.io";

/// Field manager / controller name used for API writes and the `part-of` label
pub const CONTROLLER_NAME: &str = "site-page-controller";

/// Finalizer that keeps a deleted Page around until it is excluded from the aggregate
pub const PAGE_FINALIZER: &str = "webhost.microscaler.io/page-cleanup";

/// Annotation on a Site holding the digest of its current page aggregate
pub const PAGES_HASH_ANNOTATION: &str = "webhost.microscaler.io/pages-hash";

/// Condition type reporting whether all Site children are in the desired state
pub const CONDITION_AVAILABLE: &str = "Available";

/// Condition type flipped to False when page content changed since the last Site pass
pub const CONDITION_UP_TO_DATE: &str = "UpToDate";

pub const REASON_STARTING: &str = "Starting reconciliation";
pub const REASON_FINISHED: &str = "Finished reconciliation";
pub const REASON_FAILED: &str = "Failed reconciliation";
pub const REASON_PAGE_CHANGED: &str = "PageChanged";

/// Label keys applied to every child resource
pub const LABEL_NAME: &str = "app.kubernetes.io/name";
pub const LABEL_PART_OF: &str = "app.kubernetes.io/part-of";

/// Suffixes distinguishing the two ConfigMaps from the bare-named children
pub const STATIC_CONFIG_SUFFIX: &str = "-config";
pub const DATA_CONFIG_SUFFIX: &str = "-data";

/// Workload container and port layout
pub const CONTAINER_NAME: &str = "main";
pub const HTTP_PORT_NAME: &str = "http";
pub const HTTP_PORT: i32 = 80;
pub const STATIC_CONFIG_VOLUME: &str = "config";
pub const STATIC_CONFIG_MOUNT_PATH: &str = "/etc/nginx/conf.d";
pub const DATA_VOLUME: &str = "pages";
pub const DATA_MOUNT_PATH: &str = "/usr/share/nginx/html";
pub const STATIC_CONFIG_FILE: &str = "default.conf";

/// Default ingress class when `INGRESS_CLASS` is not set
pub const DEFAULT_INGRESS_CLASS: &str = "nginx";

/// HTTP server defaults
pub const DEFAULT_METRICS_PORT: u16 = 8080;
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;

/// Error backoff bounds (seconds) applied by the error policy
pub const MIN_ERROR_BACKOFF_SECS: u64 = 5;
pub const MAX_ERROR_BACKOFF_SECS: u64 = 300;

/// Default log filter when `RUST_LOG` is not set
pub const DEFAULT_LOG_FILTER: &str = "site_page_controller=info";
