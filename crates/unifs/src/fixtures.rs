// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/spkenv/spk

macro_rules! fixtures {
    () => {
        use rstest::fixture;

        #[allow(dead_code)]
        fn init_logging() {
            let sub = tracing_subscriber::FmtSubscriber::builder()
                .with_max_level(tracing::Level::TRACE)
                .without_time()
                .with_test_writer()
                .finish();
            let _ = tracing::subscriber::set_global_default(sub);
        }

        #[fixture]
        fn tmpdir() -> tempfile::TempDir {
            tempfile::Builder::new()
                .prefix("unifs-test-")
                .tempdir()
                .expect("failed to create dir for test")
        }

        #[fixture]
        fn memfs() -> $crate::backend::MemoryFileSystem {
            $crate::backend::MemoryFileSystem::new()
        }

        /// Type-erase a backend handle the way callers hold them.
        #[allow(dead_code)]
        fn shared<T>(fs: &T) -> $crate::SharedFileSystem
        where
            T: $crate::FileSystem + Clone + 'static,
        {
            std::sync::Arc::new(fs.clone())
        }

        /// Seed a file, creating its parent directories as needed.
        #[allow(dead_code)]
        fn ensure(fs: &dyn $crate::FileSystem, path: &str, data: &[u8]) {
            use $crate::FileSystem as _;
            let path = $crate::VfsPath::new(path);
            fs.create_directory(&path.parent())
                .expect("failed to make dirs");
            fs.write_all(&path, data).expect("failed to write file data");
        }

        /// Records every delivered event and lets tests block until an
        /// expected number has arrived.
        #[allow(dead_code)]
        #[derive(Default)]
        struct CollectingSubscriber {
            state: parking_lot::Mutex<Collected>,
            signal: parking_lot::Condvar,
        }

        #[allow(dead_code)]
        #[derive(Default)]
        struct Collected {
            changes: Vec<(
                $crate::watch::ChangeKind,
                $crate::VfsPath,
                Option<$crate::VfsPath>,
            )>,
            errors: Vec<String>,
        }

        #[allow(dead_code)]
        impl CollectingSubscriber {
            fn record(
                &self,
                kind: $crate::watch::ChangeKind,
                path: $crate::VfsPath,
                old_path: Option<$crate::VfsPath>,
            ) {
                self.state.lock().changes.push((kind, path, old_path));
                self.signal.notify_all();
            }

            fn changes(
                &self,
            ) -> Vec<(
                $crate::watch::ChangeKind,
                $crate::VfsPath,
                Option<$crate::VfsPath>,
            )> {
                self.state.lock().changes.clone()
            }

            fn errors(&self) -> Vec<String> {
                self.state.lock().errors.clone()
            }

            fn wait_for_changes(&self, count: usize, timeout: std::time::Duration) -> bool {
                let deadline = std::time::Instant::now() + timeout;
                let mut state = self.state.lock();
                while state.changes.len() < count {
                    if self.signal.wait_until(&mut state, deadline).timed_out() {
                        return state.changes.len() >= count;
                    }
                }
                true
            }

            fn wait_for_errors(&self, count: usize, timeout: std::time::Duration) -> bool {
                let deadline = std::time::Instant::now() + timeout;
                let mut state = self.state.lock();
                while state.errors.len() < count {
                    if self.signal.wait_until(&mut state, deadline).timed_out() {
                        return state.errors.len() >= count;
                    }
                }
                true
            }
        }

        impl $crate::watch::WatchSubscriber for CollectingSubscriber {
            fn created(&self, event: &$crate::watch::ChangeEvent) {
                self.record($crate::watch::ChangeKind::Created, event.path.clone(), None);
            }

            fn deleted(&self, event: &$crate::watch::ChangeEvent) {
                self.record($crate::watch::ChangeKind::Deleted, event.path.clone(), None);
            }

            fn changed(&self, event: &$crate::watch::ChangeEvent) {
                self.record($crate::watch::ChangeKind::Changed, event.path.clone(), None);
            }

            fn renamed(&self, event: &$crate::watch::RenameEvent) {
                self.record(
                    $crate::watch::ChangeKind::Renamed,
                    event.path.clone(),
                    Some(event.old_path.clone()),
                );
            }

            fn error(&self, event: &$crate::watch::WatchErrorEvent) {
                self.state.lock().errors.push(event.error.to_string());
                self.signal.notify_all();
            }
        }
    };
}
