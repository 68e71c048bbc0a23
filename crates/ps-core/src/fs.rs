//! Filesystem client descriptor
//!
//! Credentials handed to the downstream storage client. Building one only
//! checks that every required field is present; nothing is contacted.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Error, Result};

/// Default filesystem type
pub const DEFAULT_FS_TYPE: &str = "afs";

/// Connection parameters for a Hadoop-compatible filesystem client
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FsClientDescriptor {
    /// Filesystem flavor (`afs`, `hdfs`, ...)
    pub fs_type: String,

    /// Filesystem URI, e.g. `afs://cluster:9902`
    pub uri: String,

    pub user: String,

    pub passwd: String,

    /// Path of the `hadoop` binary used by the client
    pub hadoop_bin: String,
}

impl fmt::Debug for FsClientDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FsClientDescriptor")
            .field("fs_type", &self.fs_type)
            .field("uri", &self.uri)
            .field("user", &self.user)
            .field("passwd", &"<redacted>")
            .field("hadoop_bin", &self.hadoop_bin)
            .finish()
    }
}

/// Validated filesystem client parameters
#[derive(Debug, Clone)]
pub struct FileSystem {
    descriptor: FsClientDescriptor,
}

impl FileSystem {
    pub fn builder() -> FileSystemBuilder {
        FileSystemBuilder::default()
    }

    /// Descriptor to pass to the storage client
    pub fn descriptor(&self) -> &FsClientDescriptor {
        &self.descriptor
    }

    pub fn into_descriptor(self) -> FsClientDescriptor {
        self.descriptor
    }
}

/// Builder for [`FileSystem`]
#[derive(Debug, Default)]
pub struct FileSystemBuilder {
    fs_type: Option<String>,
    uri: Option<String>,
    user: Option<String>,
    passwd: Option<String>,
    hadoop_bin: Option<String>,
}

impl FileSystemBuilder {
    pub fn fs_type(mut self, fs_type: impl Into<String>) -> Self {
        self.fs_type = Some(fs_type.into());
        self
    }

    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn passwd(mut self, passwd: impl Into<String>) -> Self {
        self.passwd = Some(passwd.into());
        self
    }

    pub fn hadoop_bin(mut self, hadoop_bin: impl Into<String>) -> Self {
        self.hadoop_bin = Some(hadoop_bin.into());
        self
    }

    /// Build the descriptor, failing on the first missing required field
    ///
    /// Present but empty values are accepted.
    pub fn build(self) -> Result<FileSystem> {
        fn required(value: Option<String>, field: &str) -> Result<String> {
            value.ok_or_else(|| Error::InvalidConfig {
                message: format!("filesystem descriptor is missing required field `{}`", field),
            })
        }

        Ok(FileSystem {
            descriptor: FsClientDescriptor {
                fs_type: self.fs_type.unwrap_or_else(|| DEFAULT_FS_TYPE.to_string()),
                uri: required(self.uri, "uri")?,
                user: required(self.user, "user")?,
                passwd: required(self.passwd, "passwd")?,
                hadoop_bin: required(self.hadoop_bin, "hadoop_bin")?,
            },
        })
    }
}
