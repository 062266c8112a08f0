// Deployment metadata handle
// The caller-owned entry point: one open store plus the snapshot of the last
// query. Every operation that needs a store returns MetadataError::NotOpen
// when none is open.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::NaiveDateTime;

use crate::config::ResolverConfig;
use crate::constants::ADJUSTMENTS_PARAM_SUFFIX;
use crate::datagram::AttitudeDatagram;
use crate::db::schema::{self, DeploymentSummary, Mark};
use crate::db::Store;
use crate::error::{MetadataError, Result};
use crate::export::{export_metadata_to_csv, ExportReport};
use crate::legacy::{self, ConvertOptions, ConvertReport};
use crate::marks;
use crate::resolve::{self, DepthResult, LocationResult, SummaryFrom};
use crate::sync::{self, AsyncSensorData, CameraInfo, FrameTime, ImageEntry, Snapshot, SyncSensorData};
use crate::timestamp::TimeWindow;
use crate::trim::{self, TrimReport};

#[derive(Debug)]
pub struct DeploymentMetadata {
    store: Option<Store>,
    snapshot: Snapshot,
    /// Set by the first successful query after open.
    queried: bool,
    config: ResolverConfig,
}

impl Default for DeploymentMetadata {
    fn default() -> Self {
        Self::new()
    }
}

impl DeploymentMetadata {
    /// A closed handle using the resolver configuration from the environment.
    pub fn new() -> Self {
        Self::with_config(ResolverConfig::from_env())
    }

    pub fn with_config(config: ResolverConfig) -> Self {
        Self {
            store: None,
            snapshot: Snapshot::default(),
            queried: false,
            config,
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    // ----- Lifecycle -----

    /// Open the deployment at `deployment_path`, closing any open one first.
    pub fn open(&mut self, deployment_path: &Path) -> Result<()> {
        self.close()?;
        self.store = Some(Store::open(deployment_path)?);
        log::info!("Opened deployment {}", deployment_path.display());
        Ok(())
    }

    /// Close the store and drop the snapshot. Closing a closed handle is fine.
    pub fn close(&mut self) -> Result<()> {
        self.snapshot = Snapshot::default();
        self.queried = false;
        match self.store.take() {
            Some(store) => store.close(),
            None => Ok(()),
        }
    }

    pub fn is_open(&self) -> bool {
        self.store.is_some()
    }

    pub fn store(&self) -> Result<&Store> {
        self.store.as_ref().ok_or(MetadataError::NotOpen)
    }

    fn store_mut(&mut self) -> Result<&mut Store> {
        self.store.as_mut().ok_or(MetadataError::NotOpen)
    }

    pub fn deployment_path(&self) -> Result<&Path> {
        Ok(self.store()?.deployment_path())
    }

    // ----- Query and snapshot accessors -----

    /// Rebuild the snapshot. On error the previous snapshot is kept.
    pub fn query(
        &mut self,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
        return_discards: bool,
    ) -> Result<&Snapshot> {
        let snapshot = sync::run_query(self.store()?.conn(), &TimeWindow::new(start, end), return_discards)?;
        self.snapshot = snapshot;
        self.queried = true;
        Ok(&self.snapshot)
    }

    /// Query everything if no query has run since open. A windowed query
    /// that matched nothing still counts.
    fn ensure_queried(&mut self) -> Result<()> {
        if !self.queried {
            self.query(None, None, false)?;
        }
        Ok(())
    }

    pub fn has_queried(&self) -> bool {
        self.queried
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn cameras(&self) -> &[CameraInfo] {
        &self.snapshot.cameras
    }

    pub fn image_data(&self) -> &BTreeMap<String, BTreeMap<i64, ImageEntry>> {
        &self.snapshot.image_data
    }

    pub fn image_numbers(&self) -> &[i64] {
        &self.snapshot.image_numbers
    }

    pub fn sensor_data(&self) -> &SyncSensorData {
        &self.snapshot.sensor_data
    }

    pub fn async_data(&self) -> &AsyncSensorData {
        &self.snapshot.async_data
    }

    pub fn marks(&self) -> &BTreeMap<i64, String> {
        &self.snapshot.marks
    }

    pub fn dropped_data(&self) -> &BTreeMap<String, BTreeMap<i64, FrameTime>> {
        &self.snapshot.dropped_data
    }

    pub fn deployment_parameters(&self) -> &BTreeMap<String, String> {
        &self.snapshot.deployment_data
    }

    pub fn timespan(&self) -> (Option<NaiveDateTime>, Option<NaiveDateTime>) {
        self.snapshot.timespan()
    }

    /// Path of an image file on disk.
    pub fn image_path(&self, camera: &str, name: &str) -> Result<PathBuf> {
        Ok(self.store()?.image_path(camera, name))
    }

    // ----- Derived values -----

    pub fn locations(&mut self) -> Result<LocationResult> {
        self.store()?;
        self.ensure_queried()?;
        Ok(resolve::resolve_locations(&self.snapshot, &self.config.location_sensor_id))
    }

    /// Depths using the configured sensor, header, field and separator.
    pub fn depths(&mut self) -> Result<DepthResult> {
        let config = self.config.clone();
        self.depths_with(&config)
    }

    pub fn depths_with(&mut self, config: &ResolverConfig) -> Result<DepthResult> {
        self.store()?;
        self.ensure_queried()?;
        Ok(resolve::resolve_depths(&self.snapshot, config))
    }

    pub fn attitudes(&mut self) -> Result<BTreeMap<i64, AttitudeDatagram>> {
        self.store()?;
        self.ensure_queried()?;
        Ok(resolve::resolve_attitudes(&self.snapshot, &self.config))
    }

    pub fn summary(&self) -> Result<Option<DeploymentSummary>> {
        schema::get_summary(self.store()?.conn())
    }

    /// Fill in the summary location and maximum depth. Returns whether it was written.
    pub fn update_summary(
        &mut self,
        from: SummaryFrom,
        explicit: (Option<f64>, Option<f64>),
        overwrite: bool,
    ) -> Result<bool> {
        self.store()?;
        self.ensure_queried()?;
        let conn = self.store()?.conn();
        resolve::update_summary(conn, &self.snapshot, &self.config, from, explicit, overwrite)
    }

    // ----- Marks -----

    pub fn create_mark(&mut self, frame: i64, description: &str) -> Result<()> {
        let store = self.store.as_ref().ok_or(MetadataError::NotOpen)?;
        marks::create_mark(store.conn(), &mut self.snapshot, frame, description)
    }

    pub fn remove_mark(&mut self, frame: i64) -> Result<bool> {
        let store = self.store.as_ref().ok_or(MetadataError::NotOpen)?;
        marks::remove_mark(store.conn(), &mut self.snapshot, frame)
    }

    pub fn all_marks(&self) -> Result<Vec<Mark>> {
        marks::all_marks(self.store()?.conn())
    }

    pub fn find_next_mark(&self, frame: i64) -> Result<Option<Mark>> {
        marks::find_next_mark(self.store()?.conn(), frame)
    }

    pub fn find_previous_mark(&self, frame: i64) -> Result<Option<Mark>> {
        marks::find_previous_mark(self.store()?.conn(), frame)
    }

    // ----- Discard and trim -----

    pub fn set_discarded(&self, start: i64, end: i64, unset: bool) -> Result<usize> {
        marks::set_discarded(self.store()?.conn(), start, end, unset)
    }

    pub fn delete_discarded_images(&self) -> Result<TrimReport> {
        trim::delete_discarded_images(self.store()?)
    }

    // ----- Parameters -----

    pub fn get_parameter(&self, name: &str) -> Result<Option<String>> {
        schema::get_parameter(self.store()?.conn(), name)
    }

    /// Store a deployment parameter. Query again for it to reach the snapshot.
    pub fn set_parameter(&self, name: &str, value: &str) -> Result<()> {
        schema::set_parameter(self.store()?.conn(), name, value)
    }

    fn adjustments_key(&self, camera: &str) -> Result<String> {
        let record = schema::get_camera(self.store()?.conn(), camera)?
            .ok_or_else(|| MetadataError::UnknownCamera(camera.to_string()))?;
        match record.mac_address.filter(|m| !m.is_empty()) {
            Some(mac) => Ok(format!("{}{}", mac, ADJUSTMENTS_PARAM_SUFFIX)),
            None => Err(MetadataError::InvalidArgument(format!(
                "Camera {} has no MAC address",
                camera
            ))),
        }
    }

    /// Store an opaque image adjustment blob for a camera, keyed by its MAC address.
    pub fn set_image_adjustments(&self, camera: &str, adjustments: &[u8]) -> Result<()> {
        let key = self.adjustments_key(camera)?;
        self.set_parameter(&key, &STANDARD.encode(adjustments))
    }

    pub fn get_image_adjustments(&self, camera: &str) -> Result<Option<Vec<u8>>> {
        let key = self.adjustments_key(camera)?;
        match self.get_parameter(&key)? {
            Some(encoded) => Ok(Some(STANDARD.decode(encoded.trim())?)),
            None => Ok(None),
        }
    }

    /// Record MD5 checksums for one camera's images in a single transaction.
    /// Returns the number of image rows updated.
    pub fn update_checksums(&mut self, camera: &str, checksums: &[(String, String)]) -> Result<usize> {
        let conn = self.store_mut()?.conn_mut();
        let tx = conn.transaction()?;
        let mut updated = 0;
        for (name, checksum) in checksums {
            updated += schema::update_image_checksum(&tx, camera, name, checksum)?;
        }
        tx.commit()?;
        log::debug!("Updated {} checksums for {}", updated, camera);
        Ok(updated)
    }

    // ----- Export and conversion -----

    pub fn export_csv(&self, prefix: &Path) -> Result<ExportReport> {
        export_metadata_to_csv(self.store()?, prefix)
    }

    /// Convert a flat-file deployment, then open it and query everything.
    pub fn convert_to_database(
        &mut self,
        deployment_path: &Path,
        cameras: &[String],
        labels: &[String],
        options: ConvertOptions,
    ) -> Result<ConvertReport> {
        self.close()?;
        let report = legacy::convert_to_database(deployment_path, cameras, labels, options)?;
        self.open(deployment_path)?;
        self.query(None, None, false)?;
        Ok(report)
    }
}
