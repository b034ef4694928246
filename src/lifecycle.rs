//! Measurement lifecycle state machine.
//!
//! All status changes go through [`MeasurementLifecycle`], which holds one
//! lock across reading the current statuses, writing the new one and
//! re-checking the device-wide invariant: at most one measurement is OPEN,
//! at most one is PAUSED, and never one of each.
//!
//! The lock is process-wide, so several lifecycles over the same store
//! still serialize their transitions.

use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, error, info, warn};

use crate::error::{CResult, CaptureError};
use crate::sensor_file::delete_best_effort;
use crate::store::MeasurementStore;
use crate::types::{
    AttachmentStatus, Event, EventType, Measurement, MeasurementStatus, Modality,
    PERSISTENCE_FILE_FORMAT_VERSION,
};

static TRANSITION_LOCK: Mutex<()> = Mutex::new(());

pub struct MeasurementLifecycle<S: MeasurementStore> {
    store: Arc<S>,
}

impl<S: MeasurementStore> MeasurementLifecycle<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    fn lock(&self) -> CResult<MutexGuard<'static, ()>> {
        TRANSITION_LOCK
            .lock()
            .map_err(|_| CaptureError::Internal("transition lock poisoned".to_string()))
    }

    /// Moves measurement `id` to `status`, enforcing the legal edges and the
    /// device-wide invariant
    pub fn transition(&self, id: u64, status: MeasurementStatus) -> CResult<()> {
        let _guard = self.lock()?;
        self.transition_locked(id, status, false).map(|_| ())
    }

    /// Like [`transition`](Self::transition) but skips the invariant check
    /// after moving to FINISHED. Only for startup reconciliation.
    pub fn transition_allowing_corrupted(&self, id: u64, status: MeasurementStatus) -> CResult<()> {
        let _guard = self.lock()?;
        self.transition_locked(id, status, true).map(|_| ())
    }

    /// Fails with `InvalidTransition` unless `id` may move to `status`
    fn check_transition(&self, id: u64, status: MeasurementStatus) -> CResult<MeasurementStatus> {
        let current = self.store.read_status(id)?;
        if !current.can_transition_to(status) {
            return Err(CaptureError::InvalidTransition {
                from: current,
                to: status,
            });
        }
        Ok(current)
    }

    fn transition_locked(
        &self,
        id: u64,
        status: MeasurementStatus,
        allow_corrupted: bool,
    ) -> CResult<MeasurementStatus> {
        let current = self.check_transition(id, status)?;

        // a failed cleanup must leave the status unchanged
        if matches!(
            status,
            MeasurementStatus::Skipped | MeasurementStatus::Deprecated
        ) {
            self.discard_unsent_data(id, status)?;
        }

        if self.store.write_status(id, status)? != 1 {
            return Err(CaptureError::NotFound(id));
        }
        debug!("Measurement {}: {:?} -> {:?}", id, current, status);

        if !(allow_corrupted && status == MeasurementStatus::Finished) {
            self.check_invariant(status)?;
        }

        Ok(current)
    }

    fn check_invariant(&self, status: MeasurementStatus) -> CResult<()> {
        let open = self.store.measurements_with_status(MeasurementStatus::Open)?;
        let paused = self
            .store
            .measurements_with_status(MeasurementStatus::Paused)?;

        let violation = match status {
            MeasurementStatus::Open if !paused.is_empty() || open.len() > 1 => Some(format!(
                "{} OPEN and {} PAUSED after opening",
                open.len(),
                paused.len()
            )),
            MeasurementStatus::Paused if !open.is_empty() || paused.len() > 1 => Some(format!(
                "{} OPEN and {} PAUSED after pausing",
                open.len(),
                paused.len()
            )),
            MeasurementStatus::Finished if !open.is_empty() || !paused.is_empty() => Some(format!(
                "{} OPEN and {} PAUSED after finishing",
                open.len(),
                paused.len()
            )),
            _ => None,
        };

        match violation {
            Some(message) => {
                error!("Measurement state invariant violated: {}", message);
                Err(CaptureError::CorruptedState(message))
            }
            None => Ok(()),
        }
    }

    /// Removes raw sensor files and pending attachments of a measurement that
    /// will never be uploaded. An attachment is re-tagged only after its
    /// payload is gone.
    fn discard_unsent_data(&self, id: u64, status: MeasurementStatus) -> CResult<()> {
        let samples = self.store.read_samples(id)?;
        for file in &samples.inertial_files {
            delete_best_effort(&file.path)?;
        }

        let attachment_status = if status == MeasurementStatus::Skipped {
            AttachmentStatus::Skipped
        } else {
            AttachmentStatus::Deprecated
        };
        for attachment in self.store.attachments(id)? {
            if attachment.status != AttachmentStatus::Saved {
                continue;
            }
            delete_best_effort(&attachment.path)?;
            if self
                .store
                .write_attachment_status(attachment.id, attachment_status)?
                != 1
            {
                warn!("Attachment {} vanished while discarding", attachment.id);
            }
        }
        Ok(())
    }

    /// Creates a new OPEN measurement and records its start
    pub fn start(&self, modality: Modality, timestamp: i64) -> CResult<Measurement> {
        let _guard = self.lock()?;
        if let Some(existing) = self.capturing_measurement()? {
            return Err(CaptureError::CorruptedState(format!(
                "Measurement {} is still {:?}",
                existing.id, existing.status
            )));
        }

        let measurement =
            self.store
                .create_measurement(modality, timestamp, PERSISTENCE_FILE_FORMAT_VERSION)?;
        self.store.append_event(
            measurement.id,
            Event::new(EventType::LifecycleStart, timestamp),
        )?;
        self.store
            .append_event(measurement.id, Event::modality_change(modality, timestamp))?;
        info!("Started measurement {} ({})", measurement.id, modality);
        Ok(measurement)
    }

    pub fn pause(&self, id: u64, timestamp: i64) -> CResult<()> {
        self.lifecycle_step(id, MeasurementStatus::Paused, EventType::LifecyclePause, timestamp)
    }

    pub fn resume(&self, id: u64, timestamp: i64) -> CResult<()> {
        self.lifecycle_step(id, MeasurementStatus::Open, EventType::LifecycleResume, timestamp)
    }

    pub fn stop(&self, id: u64, timestamp: i64) -> CResult<()> {
        self.lifecycle_step(id, MeasurementStatus::Finished, EventType::LifecycleStop, timestamp)
    }

    fn lifecycle_step(
        &self,
        id: u64,
        status: MeasurementStatus,
        event_type: EventType,
        timestamp: i64,
    ) -> CResult<()> {
        let _guard = self.lock()?;
        self.check_transition(id, status)?;
        self.store.append_event(id, Event::new(event_type, timestamp))?;
        self.transition_locked(id, status, false)?;
        info!("Measurement {} is now {:?}", id, status);
        Ok(())
    }

    /// Records a change of transport mode while capturing
    pub fn change_modality(&self, id: u64, modality: Modality, timestamp: i64) -> CResult<()> {
        let _guard = self.lock()?;
        let status = self.store.read_status(id)?;
        if !status.is_capturing() {
            return Err(CaptureError::InvalidArgument(format!(
                "Cannot change modality of {:?} measurement {}",
                status, id
            )));
        }
        self.store
            .append_event(id, Event::modality_change(modality, timestamp))
    }

    /// Stores the distance covered so far; only while OPEN and never decreasing
    pub fn update_distance(&self, id: u64, distance: f64) -> CResult<()> {
        let _guard = self.lock()?;
        let measurement = self.store.measurement(id)?;
        if measurement.status != MeasurementStatus::Open {
            return Err(CaptureError::InvalidArgument(format!(
                "Distance of {:?} measurement {} is frozen",
                measurement.status, id
            )));
        }
        if distance < measurement.distance {
            return Err(CaptureError::InvalidArgument(format!(
                "Distance must not decrease ({} -> {})",
                measurement.distance, distance
            )));
        }
        if self.store.update_distance(id, distance)? != 1 {
            return Err(CaptureError::NotFound(id));
        }
        Ok(())
    }

    /// Measurement uploaded while attachments are still pending
    pub fn mark_uploading(&self, id: u64) -> CResult<()> {
        self.transition(id, MeasurementStatus::Uploading)
    }

    /// Records the outcome of an upload; `outcome` must be a terminal status
    pub fn finish_upload(&self, id: u64, outcome: MeasurementStatus) -> CResult<()> {
        if !outcome.is_terminal() {
            return Err(CaptureError::InvalidArgument(format!(
                "{:?} is not an upload outcome",
                outcome
            )));
        }
        self.transition(id, outcome)
    }

    /// The OPEN or PAUSED measurement, if any
    pub fn current_measurement(&self) -> CResult<Option<Measurement>> {
        let _guard = self.lock()?;
        self.capturing_measurement()
    }

    fn capturing_measurement(&self) -> CResult<Option<Measurement>> {
        let mut capturing = self.store.measurements_with_status(MeasurementStatus::Open)?;
        capturing.extend(
            self.store
                .measurements_with_status(MeasurementStatus::Paused)?,
        );
        Ok(capturing.into_iter().next())
    }

    /// Finishes every measurement left OPEN or PAUSED by a previous run.
    ///
    /// Returns the ids that were finished.
    pub fn reconcile_on_startup(&self) -> CResult<Vec<u64>> {
        let _guard = self.lock()?;
        let mut stray = self.store.measurements_with_status(MeasurementStatus::Open)?;
        stray.extend(
            self.store
                .measurements_with_status(MeasurementStatus::Paused)?,
        );

        let mut finished = Vec::with_capacity(stray.len());
        for measurement in stray {
            warn!(
                "Finishing stray {:?} measurement {}",
                measurement.status, measurement.id
            );
            self.transition_locked(measurement.id, MeasurementStatus::Finished, true)?;
            finished.push(measurement.id);
        }
        Ok(finished)
    }

    /// Deletes a measurement that is no longer being captured, along with its
    /// sensor files and attachments
    pub fn delete(&self, id: u64) -> CResult<()> {
        let _guard = self.lock()?;
        let status = self.store.read_status(id)?;
        if status.is_capturing() {
            return Err(CaptureError::InvalidArgument(format!(
                "Cannot delete {:?} measurement {}",
                status, id
            )));
        }

        let samples = self.store.read_samples(id)?;
        for file in &samples.inertial_files {
            delete_best_effort(&file.path)?;
        }
        for attachment in self.store.attachments(id)? {
            delete_best_effort(&attachment.path)?;
        }

        if self.store.delete_measurement(id)? != 1 {
            return Err(CaptureError::NotFound(id));
        }
        info!("Deleted measurement {}", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor_file::SensorFileWriter;
    use crate::store::{InertialFile, MemoryStore};
    use crate::types::{Attachment, Point3D, SensorKind};
    use std::env;
    use std::fs;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    fn lifecycle() -> MeasurementLifecycle<MemoryStore> {
        MeasurementLifecycle::new(Arc::new(MemoryStore::new()))
    }

    fn assert_invariant(lifecycle: &MeasurementLifecycle<MemoryStore>) {
        let store = lifecycle.store();
        let open = store
            .measurements_with_status(MeasurementStatus::Open)
            .unwrap()
            .len();
        let paused = store
            .measurements_with_status(MeasurementStatus::Paused)
            .unwrap()
            .len();
        assert!(open + paused <= 1, "{open} open, {paused} paused");
    }

    #[test]
    fn test_capture_lifecycle() {
        let lifecycle = lifecycle();
        let m = lifecycle.start(Modality::Bicycle, 1_000).unwrap();
        assert_invariant(&lifecycle);

        lifecycle.pause(m.id, 2_000).unwrap();
        assert_eq!(lifecycle.store().read_status(m.id).unwrap(), MeasurementStatus::Paused);
        assert_invariant(&lifecycle);

        lifecycle.resume(m.id, 3_000).unwrap();
        lifecycle.stop(m.id, 4_000).unwrap();
        assert_eq!(lifecycle.store().read_status(m.id).unwrap(), MeasurementStatus::Finished);
        assert!(lifecycle.current_measurement().unwrap().is_none());

        let events: Vec<EventType> = lifecycle
            .store()
            .read_samples(m.id)
            .unwrap()
            .events
            .iter()
            .map(|e| e.event_type)
            .collect();
        assert_eq!(
            events,
            vec![
                EventType::LifecycleStart,
                EventType::ModalityTypeChange,
                EventType::LifecyclePause,
                EventType::LifecycleResume,
                EventType::LifecycleStop,
            ]
        );
    }

    #[test]
    fn test_finish_succeeds_without_other_capturing_measurement() {
        let lifecycle = lifecycle();
        let m = lifecycle.start(Modality::Car, 0).unwrap();
        lifecycle.transition(m.id, MeasurementStatus::Finished).unwrap();
    }

    #[test]
    fn test_unknown_measurement() {
        let lifecycle = lifecycle();
        for status in MeasurementStatus::ALL {
            assert!(matches!(
                lifecycle.transition(99, status),
                Err(CaptureError::NotFound(99))
            ));
        }
    }

    #[test]
    fn test_illegal_transitions() {
        let lifecycle = lifecycle();
        let m = lifecycle.start(Modality::Walking, 0).unwrap();
        let err = lifecycle
            .transition(m.id, MeasurementStatus::Synced)
            .unwrap_err();
        assert!(matches!(
            err,
            CaptureError::InvalidTransition {
                from: MeasurementStatus::Open,
                to: MeasurementStatus::Synced
            }
        ));
        lifecycle.stop(m.id, 1).unwrap();
        assert!(lifecycle.resume(m.id, 2).is_err());
        lifecycle.finish_upload(m.id, MeasurementStatus::Synced).unwrap();
        assert!(lifecycle
            .transition(m.id, MeasurementStatus::Finished)
            .is_err());
        assert!(matches!(
            lifecycle.finish_upload(m.id, MeasurementStatus::Open),
            Err(CaptureError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_second_start_is_rejected() {
        let lifecycle = lifecycle();
        let m = lifecycle.start(Modality::Walking, 0).unwrap();
        assert!(matches!(
            lifecycle.start(Modality::Walking, 1),
            Err(CaptureError::CorruptedState(_))
        ));
        lifecycle.pause(m.id, 2).unwrap();
        assert!(lifecycle.start(Modality::Walking, 3).is_err());
        lifecycle.stop(m.id, 4).unwrap();
        lifecycle.start(Modality::Walking, 5).unwrap();
        assert_invariant(&lifecycle);
    }

    #[test]
    fn test_invariant_violation_detected() {
        let store = Arc::new(MemoryStore::new());
        let a = store.create_measurement(Modality::Car, 0, 3).unwrap();
        let b = store.create_measurement(Modality::Car, 1, 3).unwrap();
        let lifecycle = MeasurementLifecycle::new(store);

        // two OPEN measurements exist; finishing one leaves the other OPEN
        assert!(matches!(
            lifecycle.transition(a.id, MeasurementStatus::Finished),
            Err(CaptureError::CorruptedState(_))
        ));

        // a second PAUSED measurement next to the one being paused
        let c = lifecycle.store().create_measurement(Modality::Car, 2, 3).unwrap();
        lifecycle
            .store()
            .write_status(c.id, MeasurementStatus::Paused)
            .unwrap();
        assert!(matches!(
            lifecycle.transition(b.id, MeasurementStatus::Paused),
            Err(CaptureError::CorruptedState(_))
        ));
    }

    #[test]
    fn test_reconcile_on_startup() {
        let store = Arc::new(MemoryStore::new());
        let a = store.create_measurement(Modality::Car, 0, 3).unwrap();
        let b = store.create_measurement(Modality::Car, 1, 3).unwrap();
        store.write_status(b.id, MeasurementStatus::Paused).unwrap();
        let lifecycle = MeasurementLifecycle::new(store);

        let mut fixed = lifecycle.reconcile_on_startup().unwrap();
        fixed.sort();
        assert_eq!(fixed, vec![a.id, b.id]);
        assert_invariant(&lifecycle);
        assert!(lifecycle.reconcile_on_startup().unwrap().is_empty());
    }

    #[test]
    fn test_concurrent_starts_open_only_one() {
        let lifecycle = Arc::new(lifecycle());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let lifecycle = Arc::clone(&lifecycle);
                thread::spawn(move || lifecycle.start(Modality::Bus, i).is_ok())
            })
            .collect();
        let started = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(started, 1);
        assert_invariant(&lifecycle);
    }

    #[test]
    fn test_skip_discards_raw_data() {
        let dir = env::temp_dir().join("datacapturing_skip_test");
        let _ = fs::remove_dir_all(&dir);
        let lifecycle = lifecycle();
        let store = Arc::clone(lifecycle.store());
        let m = lifecycle.start(Modality::Bicycle, 0).unwrap();

        let accel_path = dir.join("0.cyfa");
        let mut writer = SensorFileWriter::open(&accel_path).unwrap();
        writer.append(&Point3D::new(0.0, 0.0, 9.81, 1)).unwrap();
        writer.finish().unwrap();
        store
            .add_inertial_file(
                m.id,
                InertialFile {
                    sensor: SensorKind::Accelerometer,
                    path: accel_path.clone(),
                    point_count: 1,
                },
            )
            .unwrap();
        // never written, must not fail the cleanup
        store
            .add_inertial_file(
                m.id,
                InertialFile {
                    sensor: SensorKind::Gyroscope,
                    path: dir.join("0.cyfr"),
                    point_count: 0,
                },
            )
            .unwrap();
        let image = dir.join("image.jpg");
        fs::write(&image, b"jpeg").unwrap();
        let attachment = store.add_attachment(m.id, image.clone()).unwrap();

        lifecycle.stop(m.id, 10).unwrap();
        lifecycle
            .finish_upload(m.id, MeasurementStatus::Skipped)
            .unwrap();

        assert!(!accel_path.exists());
        assert!(!image.exists());
        let attachments = store.attachments(m.id).unwrap();
        assert_eq!(attachments[0].id, attachment.id);
        assert_eq!(attachments[0].status, AttachmentStatus::Skipped);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_failed_discard_can_be_retried() {
        let dir = env::temp_dir().join("datacapturing_failed_discard_test");
        let _ = fs::remove_dir_all(&dir);
        let lifecycle = lifecycle();
        let store = Arc::clone(lifecycle.store());
        let m = lifecycle.start(Modality::Car, 0).unwrap();

        // a directory cannot be removed as a file
        let payload = dir.join("attachment");
        fs::create_dir_all(&payload).unwrap();
        let attachment = store.add_attachment(m.id, payload.clone()).unwrap();
        lifecycle.stop(m.id, 1).unwrap();

        assert!(matches!(
            lifecycle.finish_upload(m.id, MeasurementStatus::Skipped),
            Err(CaptureError::Io(_))
        ));
        assert_eq!(store.read_status(m.id).unwrap(), MeasurementStatus::Finished);
        assert_eq!(store.attachments(m.id).unwrap()[0].status, AttachmentStatus::Saved);

        fs::remove_dir(&payload).unwrap();
        lifecycle
            .finish_upload(m.id, MeasurementStatus::Skipped)
            .unwrap();
        assert_eq!(store.read_status(m.id).unwrap(), MeasurementStatus::Skipped);
        let attachments = store.attachments(m.id).unwrap();
        assert_eq!(attachments[0].id, attachment.id);
        assert_eq!(attachments[0].status, AttachmentStatus::Skipped);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_lifecycles_sharing_a_store_open_only_one() {
        let store = Arc::new(MemoryStore::new());
        let lifecycles: Vec<_> = (0..2)
            .map(|_| Arc::new(MeasurementLifecycle::new(Arc::clone(&store))))
            .collect();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let lifecycle = Arc::clone(&lifecycles[i % 2]);
                thread::spawn(move || lifecycle.start(Modality::Bus, i as i64).is_ok())
            })
            .collect();
        let started = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(started, 1);
        assert_invariant(&lifecycles[0]);
        assert_eq!(
            lifecycles[0].current_measurement().unwrap(),
            lifecycles[1].current_measurement().unwrap()
        );
    }

    /// Delegates to a [`MemoryStore`] but can be told to reject events
    struct EventFailingStore {
        inner: MemoryStore,
        fail_events: AtomicBool,
    }

    impl MeasurementStore for EventFailingStore {
        fn create_measurement(
            &self,
            modality: Modality,
            timestamp: i64,
            file_format_version: u16,
        ) -> CResult<Measurement> {
            self.inner
                .create_measurement(modality, timestamp, file_format_version)
        }

        fn measurement(&self, id: u64) -> CResult<Measurement> {
            self.inner.measurement(id)
        }

        fn measurements_with_status(&self, status: MeasurementStatus) -> CResult<Vec<Measurement>> {
            self.inner.measurements_with_status(status)
        }

        fn write_status(&self, id: u64, status: MeasurementStatus) -> CResult<usize> {
            self.inner.write_status(id, status)
        }

        fn update_distance(&self, id: u64, distance: f64) -> CResult<usize> {
            self.inner.update_distance(id, distance)
        }

        fn append_event(&self, id: u64, event: Event) -> CResult<()> {
            if self.fail_events.load(Ordering::SeqCst) {
                return Err(CaptureError::Internal("event log unavailable".to_string()));
            }
            self.inner.append_event(id, event)
        }

        fn read_samples(&self, id: u64) -> CResult<crate::store::MeasurementSamples> {
            self.inner.read_samples(id)
        }

        fn attachments(&self, measurement_id: u64) -> CResult<Vec<Attachment>> {
            self.inner.attachments(measurement_id)
        }

        fn write_attachment_status(
            &self,
            attachment_id: u64,
            status: AttachmentStatus,
        ) -> CResult<usize> {
            self.inner.write_attachment_status(attachment_id, status)
        }

        fn delete_measurement(&self, id: u64) -> CResult<usize> {
            self.inner.delete_measurement(id)
        }
    }

    #[test]
    fn test_failed_event_leaves_status_unchanged() {
        let store = Arc::new(EventFailingStore {
            inner: MemoryStore::new(),
            fail_events: AtomicBool::new(false),
        });
        let lifecycle = MeasurementLifecycle::new(Arc::clone(&store));
        let m = lifecycle.start(Modality::Walking, 0).unwrap();

        store.fail_events.store(true, Ordering::SeqCst);
        assert!(lifecycle.pause(m.id, 1).is_err());
        assert!(lifecycle.stop(m.id, 1).is_err());
        assert_eq!(store.read_status(m.id).unwrap(), MeasurementStatus::Open);

        // an illegal step is refused before anything is logged
        store.fail_events.store(false, Ordering::SeqCst);
        assert!(matches!(
            lifecycle.resume(m.id, 2),
            Err(CaptureError::InvalidTransition { .. })
        ));
        assert_eq!(store.read_samples(m.id).unwrap().events.len(), 2);

        lifecycle.pause(m.id, 3).unwrap();
        assert_eq!(store.read_status(m.id).unwrap(), MeasurementStatus::Paused);
    }

    #[test]
    fn test_every_edge_keeps_invariant() {
        for from in MeasurementStatus::ALL {
            for to in MeasurementStatus::ALL {
                let lifecycle = lifecycle();
                let store = lifecycle.store();
                let m = store.create_measurement(Modality::Car, 0, 3).unwrap();
                store.write_status(m.id, from).unwrap();

                let result = lifecycle.transition(m.id, to);
                assert_eq!(result.is_ok(), from.can_transition_to(to), "{from:?} -> {to:?}");
                let expected = if result.is_ok() { to } else { from };
                assert_eq!(store.read_status(m.id).unwrap(), expected);
                assert_invariant(&lifecycle);
            }
        }
    }

    #[test]
    fn test_random_walk_keeps_invariant() {
        let lifecycle = lifecycle();
        let mut ids = Vec::new();
        // fixed-seed LCG keeps the walk reproducible
        let mut seed = 0x2545_f491_4f6c_dd1du64;
        let mut next = |bound: usize| {
            seed = seed
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            (seed >> 33) as usize % bound
        };

        for step in 0..500i64 {
            let action = next(5);
            if action == 0 || ids.is_empty() {
                if let Ok(m) = lifecycle.start(Modality::Walking, step) {
                    ids.push(m.id);
                }
            } else {
                let id = ids[next(ids.len())];
                let result = match action {
                    1 => lifecycle.pause(id, step),
                    2 => lifecycle.resume(id, step),
                    3 => lifecycle.stop(id, step),
                    _ => lifecycle.transition(id, MeasurementStatus::ALL[next(7)]),
                };
                if let Err(err) = result {
                    assert!(
                        matches!(err, CaptureError::InvalidTransition { .. }),
                        "step {step}: {err}"
                    );
                }
            }
            assert_invariant(&lifecycle);
        }
        assert!(ids.len() > 1);
    }

    #[test]
    fn test_deprecated_leaves_synced_attachments() {
        let lifecycle = lifecycle();
        let store = Arc::clone(lifecycle.store());
        let m = lifecycle.start(Modality::Train, 0).unwrap();
        let synced = store.add_attachment(m.id, "synced.jpg".into()).unwrap();
        store
            .write_attachment_status(synced.id, AttachmentStatus::Synced)
            .unwrap();
        store.add_attachment(m.id, "pending.jpg".into()).unwrap();

        lifecycle.stop(m.id, 1).unwrap();
        lifecycle.mark_uploading(m.id).unwrap();
        lifecycle
            .finish_upload(m.id, MeasurementStatus::Deprecated)
            .unwrap();

        let statuses: Vec<AttachmentStatus> = store
            .attachments(m.id)
            .unwrap()
            .iter()
            .map(|a| a.status)
            .collect();
        assert_eq!(
            statuses,
            vec![AttachmentStatus::Synced, AttachmentStatus::Deprecated]
        );
    }

    #[test]
    fn test_change_modality_and_distance() {
        let lifecycle = lifecycle();
        let m = lifecycle.start(Modality::Walking, 0).unwrap();
        lifecycle.change_modality(m.id, Modality::Bus, 5).unwrap();

        lifecycle.update_distance(m.id, 10.0).unwrap();
        lifecycle.update_distance(m.id, 12.5).unwrap();
        assert!(lifecycle.update_distance(m.id, 11.0).is_err());
        assert_eq!(lifecycle.store().measurement(m.id).unwrap().distance, 12.5);

        lifecycle.stop(m.id, 10).unwrap();
        assert!(lifecycle.change_modality(m.id, Modality::Car, 11).is_err());
        assert!(lifecycle.update_distance(m.id, 20.0).is_err());

        let events = lifecycle.store().read_samples(m.id).unwrap().events;
        assert!(events.iter().any(|e| e.value.as_deref() == Some("BUS")));
    }

    #[test]
    fn test_delete() {
        let lifecycle = lifecycle();
        let m = lifecycle.start(Modality::Walking, 0).unwrap();
        assert!(lifecycle.delete(m.id).is_err());
        lifecycle.stop(m.id, 1).unwrap();
        lifecycle.delete(m.id).unwrap();
        assert!(matches!(
            lifecycle.delete(m.id),
            Err(CaptureError::NotFound(_))
        ));
    }
}
