// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/spkenv/spk

use std::collections::BTreeMap;
use std::io;
use std::io::Read as _;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};

use crate::filter::SearchPattern;
use crate::fs::{
    default_file_time,
    BackendId,
    FileAccess,
    FileAttributes,
    FileShare,
    FileSystem,
    OpenMode,
    Paths,
    ReadFileSystem,
    SearchTarget,
    SharedFileSystem,
    VfsFile,
};
use crate::path::VfsPath;
use crate::watch::{CoreWatcher, EventDispatcher, Watcher, WatcherCore};
use crate::{Error, Result};

#[cfg(test)]
#[path = "./memory_test.rs"]
mod memory_test;

/// An ephemeral filesystem held entirely in memory.
///
/// The tree is guarded by one read/write lock; open streams share file
/// content so writes through a stream are visible to later reads.
/// Handles are cheap clones over the same store. Fully watchable: every
/// mutation raises the matching change event on registered watchers,
/// delivered on this store's dispatcher thread.
#[derive(Clone)]
pub struct MemoryFileSystem {
    inner: Arc<Inner>,
}

struct Inner {
    root: RwLock<Node>,
    watchers: Mutex<Vec<Weak<WatcherCore>>>,
    dispatcher: OnceCell<Arc<EventDispatcher>>,
}

#[derive(Debug, Clone)]
struct Meta {
    attributes: FileAttributes,
    created: DateTime<Utc>,
    accessed: DateTime<Utc>,
    written: DateTime<Utc>,
}

impl Meta {
    fn new() -> Self {
        let now = Utc::now();
        Self {
            attributes: FileAttributes::empty(),
            created: now,
            accessed: now,
            written: now,
        }
    }
}

#[derive(Debug)]
enum Node {
    File(FileNode),
    Dir(DirNode),
}

impl Node {
    fn meta(&self) -> &Meta {
        match self {
            Node::File(file) => &file.meta,
            Node::Dir(dir) => &dir.meta,
        }
    }

    fn meta_mut(&mut self) -> &mut Meta {
        match self {
            Node::File(file) => &mut file.meta,
            Node::Dir(dir) => &mut dir.meta,
        }
    }
}

#[derive(Debug)]
struct FileNode {
    content: Arc<RwLock<Vec<u8>>>,
    meta: Meta,
}

impl FileNode {
    fn new(content: Vec<u8>) -> Self {
        Self {
            content: Arc::new(RwLock::new(content)),
            meta: Meta::new(),
        }
    }
}

#[derive(Debug)]
struct DirNode {
    children: BTreeMap<String, Node>,
    meta: Meta,
}

impl DirNode {
    fn new() -> Self {
        Self {
            children: BTreeMap::new(),
            meta: Meta::new(),
        }
    }
}

/// A change recorded during a mutation, published once the tree lock
/// has been released.
enum Pending {
    Created(VfsPath),
    Deleted(VfsPath),
    Changed(VfsPath),
    Renamed { path: VfsPath, old_path: VfsPath },
}

fn find<'a>(root: &'a Node, path: &VfsPath) -> Option<&'a Node> {
    let mut node = root;
    for segment in path.segments() {
        match node {
            Node::Dir(dir) => node = dir.children.get(segment)?,
            Node::File(_) => return None,
        }
    }
    Some(node)
}

fn find_mut<'a>(root: &'a mut Node, path: &VfsPath) -> Option<&'a mut Node> {
    let mut node = root;
    for segment in path.segments() {
        match node {
            Node::Dir(dir) => node = dir.children.get_mut(segment)?,
            Node::File(_) => return None,
        }
    }
    Some(node)
}

fn find_dir_mut<'a>(root: &'a mut Node, path: &VfsPath) -> Option<&'a mut DirNode> {
    match find_mut(root, path) {
        Some(Node::Dir(dir)) => Some(dir),
        _ => None,
    }
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                root: RwLock::new(Node::Dir(DirNode::new())),
                watchers: Mutex::new(Vec::new()),
                dispatcher: OnceCell::new(),
            }),
        }
    }

    /// Publish recorded changes to every live watcher.
    fn notify(&self, events: Vec<Pending>) {
        if events.is_empty() {
            return;
        }
        let watchers: Vec<Arc<WatcherCore>> = {
            let mut registered = self.inner.watchers.lock();
            registered.retain(|watcher| watcher.strong_count() > 0);
            registered.iter().filter_map(Weak::upgrade).collect()
        };
        if watchers.is_empty() {
            return;
        }
        for event in events {
            for watcher in &watchers {
                match &event {
                    Pending::Created(path) => watcher.raise_created(path.clone()),
                    Pending::Deleted(path) => watcher.raise_deleted(path.clone()),
                    Pending::Changed(path) => watcher.raise_changed(path.clone()),
                    Pending::Renamed { path, old_path } => {
                        watcher.raise_renamed(path.clone(), old_path.clone())
                    }
                }
            }
        }
    }

    /// Record a write time update after a stream carrying changes is
    /// flushed or dropped.
    fn touch_written(&self, path: &VfsPath) {
        let touched = {
            let mut root = self.inner.root.write();
            match find_mut(&mut root, path) {
                Some(node @ Node::File(_)) => {
                    let now = Utc::now();
                    let meta = node.meta_mut();
                    meta.written = now;
                    meta.accessed = now;
                    true
                }
                // the file was moved or deleted while the stream was open
                _ => false,
            }
        };
        if touched {
            self.notify(vec![Pending::Changed(path.clone())]);
        }
    }
}

impl Default for MemoryFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryFileSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MemoryFileSystem")
    }
}

impl ReadFileSystem for MemoryFileSystem {
    fn identity(&self) -> BackendId {
        BackendId::of(&self.inner)
    }

    fn directory_exists_impl(&self, path: &VfsPath) -> Result<bool> {
        let root = self.inner.root.read();
        Ok(matches!(find(&root, path), Some(Node::Dir(_))))
    }

    fn file_exists_impl(&self, path: &VfsPath) -> Result<bool> {
        let root = self.inner.root.read();
        Ok(matches!(find(&root, path), Some(Node::File(_))))
    }

    fn file_length_impl(&self, path: &VfsPath) -> Result<u64> {
        let root = self.inner.root.read();
        match find(&root, path) {
            Some(Node::File(file)) => Ok(file.content.read().len() as u64),
            _ => Err(Error::NotFound(path.clone())),
        }
    }

    fn open_read_impl(&self, path: &VfsPath) -> Result<Box<dyn VfsFile>> {
        self.open_file_impl(path, OpenMode::Open, FileAccess::Read, FileShare::Read)
    }

    fn attributes_impl(&self, path: &VfsPath) -> Result<FileAttributes> {
        let root = self.inner.root.read();
        match find(&root, path) {
            Some(node) => {
                let mut attributes = node.meta().attributes;
                if matches!(node, Node::Dir(_)) {
                    attributes |= FileAttributes::DIRECTORY;
                } else if attributes.is_empty() {
                    attributes = FileAttributes::NORMAL;
                }
                Ok(attributes)
            }
            None => Err(Error::NotFound(path.clone())),
        }
    }

    fn creation_time_impl(&self, path: &VfsPath) -> Result<DateTime<Utc>> {
        let root = self.inner.root.read();
        Ok(find(&root, path)
            .map(|node| node.meta().created)
            .unwrap_or_else(default_file_time))
    }

    fn last_access_time_impl(&self, path: &VfsPath) -> Result<DateTime<Utc>> {
        let root = self.inner.root.read();
        Ok(find(&root, path)
            .map(|node| node.meta().accessed)
            .unwrap_or_else(default_file_time))
    }

    fn last_write_time_impl(&self, path: &VfsPath) -> Result<DateTime<Utc>> {
        let root = self.inner.root.read();
        Ok(find(&root, path)
            .map(|node| node.meta().written)
            .unwrap_or_else(default_file_time))
    }

    fn enumerate_impl(
        &self,
        path: &VfsPath,
        pattern: SearchPattern,
        recursive: bool,
        target: SearchTarget,
    ) -> Result<Paths<'_>> {
        let root = self.inner.root.read();
        let dir = match find(&root, path) {
            Some(Node::Dir(dir)) => dir,
            _ => return Err(Error::NotFound(path.clone())),
        };
        let mut matches = Vec::new();
        collect_matches(dir, path, &pattern, recursive, target, &mut matches);
        // the tree lock is not held while the caller consumes this
        Ok(Box::new(matches.into_iter().map(Ok::<VfsPath, Error>)))
    }

    fn to_native_path_impl(&self, path: &VfsPath) -> Result<PathBuf> {
        Ok(PathBuf::from(path.as_str()))
    }

    fn from_native_path_impl(&self, path: &Path) -> Result<VfsPath> {
        let raw = path
            .to_str()
            .ok_or_else(|| Error::invalid_path(path.to_string_lossy(), "path is not utf-8"))?;
        let converted = VfsPath::new(raw);
        converted.check_absolute()?;
        Ok(converted)
    }
}

fn collect_matches(
    dir: &DirNode,
    base: &VfsPath,
    pattern: &SearchPattern,
    recursive: bool,
    target: SearchTarget,
    out: &mut Vec<VfsPath>,
) {
    for (name, node) in &dir.children {
        let child = base.join(name.as_str());
        let wanted = match node {
            Node::Dir(_) => target.wants_directories(),
            Node::File(_) => target.wants_files(),
        };
        if wanted && pattern.matches(name) {
            out.push(child.clone());
        }
        if recursive {
            if let Node::Dir(subdir) = node {
                collect_matches(subdir, &child, pattern, recursive, target, out);
            }
        }
    }
}

impl FileSystem for MemoryFileSystem {
    fn create_directory_impl(&self, path: &VfsPath) -> Result<()> {
        if path.is_root() {
            return Ok(());
        }
        let mut created = Vec::new();
        {
            let mut root = self.inner.root.write();
            let mut node = &mut *root;
            let mut current = VfsPath::root();
            for segment in path.segments() {
                current = current.join(segment);
                let dir = match node {
                    Node::Dir(dir) => dir,
                    Node::File(_) => return Err(Error::NotADirectory(current.parent())),
                };
                if !dir.children.contains_key(segment) {
                    dir.children
                        .insert(segment.to_string(), Node::Dir(DirNode::new()));
                    created.push(Pending::Created(current.clone()));
                }
                node = dir
                    .children
                    .get_mut(segment)
                    .expect("the entry was just ensured");
            }
            if matches!(node, Node::File(_)) {
                return Err(Error::NotADirectory(current));
            }
        }
        self.notify(created);
        Ok(())
    }

    fn move_directory_impl(&self, src: &VfsPath, dest: &VfsPath) -> Result<()> {
        if src.is_root() {
            return Err(Error::AccessDenied(src.clone()));
        }
        if dest == src || dest.is_in_directory(src, true) {
            return Err(Error::invalid_path(
                dest.as_str(),
                "cannot move a directory into itself",
            ));
        }
        {
            let mut root = self.inner.root.write();
            match find(&root, src) {
                Some(Node::Dir(_)) => (),
                Some(Node::File(_)) => return Err(Error::NotADirectory(src.clone())),
                None => return Err(Error::NotFound(src.clone())),
            }
            if find(&root, dest).is_some() {
                return Err(Error::DestinationExists(dest.clone()));
            }
            if find_dir_mut(&mut root, &dest.parent()).is_none() {
                return Err(Error::NotFound(dest.parent()));
            }
            let moved = find_dir_mut(&mut root, &src.parent())
                .and_then(|parent| parent.children.remove(src.file_name()))
                .ok_or_else(|| Error::NotFound(src.clone()))?;
            let parent = find_dir_mut(&mut root, &dest.parent())
                .expect("the destination parent was just checked");
            parent.children.insert(dest.file_name().to_string(), moved);
        }
        self.notify(vec![Pending::Renamed {
            path: dest.clone(),
            old_path: src.clone(),
        }]);
        Ok(())
    }

    fn delete_directory_impl(&self, path: &VfsPath, recursive: bool) -> Result<()> {
        if path.is_root() {
            return Err(Error::AccessDenied(path.clone()));
        }
        {
            let mut root = self.inner.root.write();
            match find(&root, path) {
                Some(Node::Dir(dir)) => {
                    if !recursive && !dir.children.is_empty() {
                        return Err(Error::DirectoryNotEmpty(path.clone()));
                    }
                }
                Some(Node::File(_)) => return Err(Error::NotADirectory(path.clone())),
                None => return Err(Error::NotFound(path.clone())),
            }
            find_dir_mut(&mut root, &path.parent())
                .and_then(|parent| parent.children.remove(path.file_name()))
                .ok_or_else(|| Error::NotFound(path.clone()))?;
        }
        self.notify(vec![Pending::Deleted(path.clone())]);
        Ok(())
    }

    fn copy_file_impl(&self, src: &VfsPath, dest: &VfsPath, overwrite: bool) -> Result<()> {
        let pending = {
            let mut root = self.inner.root.write();
            let (content, attributes, written) = match find(&root, src) {
                Some(Node::File(file)) => (
                    file.content.read().clone(),
                    file.meta.attributes,
                    file.meta.written,
                ),
                Some(Node::Dir(_)) => return Err(Error::IsDirectory(src.clone())),
                None => return Err(Error::NotFound(src.clone())),
            };
            let existed = match find(&root, dest) {
                Some(Node::Dir(_)) => return Err(Error::IsDirectory(dest.clone())),
                Some(Node::File(_)) if !overwrite => {
                    return Err(Error::DestinationExists(dest.clone()))
                }
                Some(Node::File(_)) => true,
                None => false,
            };
            let parent = find_dir_mut(&mut root, &dest.parent())
                .ok_or_else(|| Error::NotFound(dest.parent()))?;
            let mut copied = FileNode::new(content);
            copied.meta.attributes = attributes;
            copied.meta.written = written;
            parent
                .children
                .insert(dest.file_name().to_string(), Node::File(copied));
            if existed {
                Pending::Changed(dest.clone())
            } else {
                Pending::Created(dest.clone())
            }
        };
        self.notify(vec![pending]);
        Ok(())
    }

    fn move_file_impl(&self, src: &VfsPath, dest: &VfsPath) -> Result<()> {
        {
            let mut root = self.inner.root.write();
            match find(&root, src) {
                Some(Node::File(_)) => (),
                Some(Node::Dir(_)) => return Err(Error::IsDirectory(src.clone())),
                None => return Err(Error::NotFound(src.clone())),
            }
            if find(&root, dest).is_some() {
                return Err(Error::DestinationExists(dest.clone()));
            }
            if find_dir_mut(&mut root, &dest.parent()).is_none() {
                return Err(Error::NotFound(dest.parent()));
            }
            let moved = find_dir_mut(&mut root, &src.parent())
                .and_then(|parent| parent.children.remove(src.file_name()))
                .ok_or_else(|| Error::NotFound(src.clone()))?;
            let parent = find_dir_mut(&mut root, &dest.parent())
                .expect("the destination parent was just checked");
            parent.children.insert(dest.file_name().to_string(), moved);
        }
        self.notify(vec![Pending::Renamed {
            path: dest.clone(),
            old_path: src.clone(),
        }]);
        Ok(())
    }

    fn delete_file_impl(&self, path: &VfsPath) -> Result<()> {
        {
            let mut root = self.inner.root.write();
            match find(&root, path) {
                Some(Node::File(_)) => (),
                Some(Node::Dir(_)) => return Err(Error::IsDirectory(path.clone())),
                None => return Err(Error::NotFound(path.clone())),
            }
            find_dir_mut(&mut root, &path.parent())
                .and_then(|parent| parent.children.remove(path.file_name()))
                .ok_or_else(|| Error::NotFound(path.clone()))?;
        }
        self.notify(vec![Pending::Deleted(path.clone())]);
        Ok(())
    }

    fn open_file_impl(
        &self,
        path: &VfsPath,
        mode: OpenMode,
        access: FileAccess,
        _share: FileShare,
    ) -> Result<Box<dyn VfsFile>> {
        if mode.requires_write() && !access.can_write() {
            return Err(Error::String(format!(
                "open mode {mode:?} requires write access"
            )));
        }
        let mut pending = Vec::new();
        let content = {
            let mut root = self.inner.root.write();
            let existing = match find(&root, path) {
                Some(Node::Dir(_)) => return Err(Error::IsDirectory(path.clone())),
                Some(Node::File(file)) => Some(Arc::clone(&file.content)),
                None => None,
            };
            match (existing, mode) {
                (Some(_), OpenMode::CreateNew) => {
                    return Err(Error::AlreadyExists(path.clone()));
                }
                (Some(content), OpenMode::Create) | (Some(content), OpenMode::Truncate) => {
                    content.write().clear();
                    pending.push(Pending::Changed(path.clone()));
                    content
                }
                (Some(content), _) => content,
                (None, OpenMode::Open) | (None, OpenMode::Truncate) => {
                    return Err(Error::NotFound(path.clone()));
                }
                (None, _) => {
                    let parent = find_dir_mut(&mut root, &path.parent())
                        .ok_or_else(|| Error::NotFound(path.parent()))?;
                    let file = FileNode::new(Vec::new());
                    let content = Arc::clone(&file.content);
                    parent
                        .children
                        .insert(path.file_name().to_string(), Node::File(file));
                    pending.push(Pending::Created(path.clone()));
                    content
                }
            }
        };
        self.notify(pending);
        let position = match mode {
            OpenMode::Append => content.read().len() as u64,
            _ => 0,
        };
        Ok(Box::new(MemoryFile {
            fs: self.clone(),
            path: path.clone(),
            content,
            position,
            access,
            dirty: false,
        }))
    }

    fn set_attributes_impl(&self, path: &VfsPath, attributes: FileAttributes) -> Result<()> {
        let mut root = self.inner.root.write();
        match find_mut(&mut root, path) {
            Some(node) => {
                node.meta_mut().attributes = attributes;
                Ok(())
            }
            None => Err(Error::NotFound(path.clone())),
        }
    }

    fn set_creation_time_impl(&self, path: &VfsPath, time: DateTime<Utc>) -> Result<()> {
        let mut root = self.inner.root.write();
        match find_mut(&mut root, path) {
            Some(node) => {
                node.meta_mut().created = time;
                Ok(())
            }
            None => Err(Error::NotFound(path.clone())),
        }
    }

    fn set_last_access_time_impl(&self, path: &VfsPath, time: DateTime<Utc>) -> Result<()> {
        let mut root = self.inner.root.write();
        match find_mut(&mut root, path) {
            Some(node) => {
                node.meta_mut().accessed = time;
                Ok(())
            }
            None => Err(Error::NotFound(path.clone())),
        }
    }

    fn set_last_write_time_impl(&self, path: &VfsPath, time: DateTime<Utc>) -> Result<()> {
        let mut root = self.inner.root.write();
        match find_mut(&mut root, path) {
            Some(node) => {
                node.meta_mut().written = time;
                Ok(())
            }
            None => Err(Error::NotFound(path.clone())),
        }
    }

    fn can_watch_impl(&self, _path: &VfsPath) -> bool {
        true
    }

    fn watch_impl(&self, path: &VfsPath) -> Result<Box<dyn Watcher>> {
        if !self.directory_exists_impl(path)? {
            return Err(Error::NotFound(path.clone()));
        }
        let dispatcher = self
            .inner
            .dispatcher
            .get_or_init(|| Arc::new(EventDispatcher::new()));
        let fs: SharedFileSystem = Arc::new(self.clone());
        let core = WatcherCore::new(fs, path.clone(), Arc::clone(dispatcher));
        self.inner.watchers.lock().push(Arc::downgrade(&core));
        Ok(Box::new(CoreWatcher { core }))
    }
}

/// An open stream over a memory file's shared content.
struct MemoryFile {
    fs: MemoryFileSystem,
    path: VfsPath,
    content: Arc<RwLock<Vec<u8>>>,
    position: u64,
    access: FileAccess,
    dirty: bool,
}

impl MemoryFile {
    /// Record buffered writes against the tree and raise the change.
    fn commit(&mut self) {
        if !self.dirty {
            return;
        }
        self.dirty = false;
        self.fs.touch_written(&self.path);
    }
}

impl io::Read for MemoryFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if !self.access.can_read() {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "stream was not opened for reading",
            ));
        }
        let content = self.content.read();
        let position = (self.position as usize).min(content.len());
        let mut remaining = &content[position..];
        let count = remaining.read(buf)?;
        self.position += count as u64;
        Ok(count)
    }
}

impl io::Write for MemoryFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.access.can_write() {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "stream was not opened for writing",
            ));
        }
        let mut content = self.content.write();
        let position = self.position as usize;
        let end = position + buf.len();
        if end > content.len() {
            content.resize(end, 0);
        }
        content[position..end].copy_from_slice(buf);
        drop(content);
        self.position = end as u64;
        self.dirty = true;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.commit();
        Ok(())
    }
}

impl io::Seek for MemoryFile {
    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        let length = self.content.read().len() as i64;
        let target = match pos {
            io::SeekFrom::Start(offset) => offset as i64,
            io::SeekFrom::End(offset) => length + offset,
            io::SeekFrom::Current(offset) => self.position as i64 + offset,
        };
        if target < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "cannot seek before the start of the stream",
            ));
        }
        self.position = target as u64;
        Ok(self.position)
    }
}

impl Drop for MemoryFile {
    fn drop(&mut self) {
        self.commit();
    }
}
