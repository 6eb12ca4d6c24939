// Copyright 2022. The Tari Project
//
// Redistribution and use in source and binary forms, with or without modification, are permitted provided that the
// following conditions are met:
//
// 1. Redistributions of source code must retain the above copyright notice, this list of conditions and the following
// disclaimer.
//
// 2. Redistributions in binary form must reproduce the above copyright notice, this list of conditions and the
// following disclaimer in the documentation and/or other materials provided with the distribution.
//
// 3. Neither the name of the copyright holder nor the names of its contributors may be used to endorse or promote
// products derived from this software without specific prior written permission.
//
// THIS SOFTWARE IS PROVIDED BY THE COPYRIGHT HOLDERS AND CONTRIBUTORS "AS IS" AND ANY EXPRESS OR IMPLIED WARRANTIES,
// INCLUDING, BUT NOT LIMITED TO, THE IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR A PARTICULAR PURPOSE ARE
// DISCLAIMED. IN NO EVENT SHALL THE COPYRIGHT HOLDER OR CONTRIBUTORS BE LIABLE FOR ANY DIRECT, INDIRECT, INCIDENTAL,
// SPECIAL, EXEMPLARY, OR CONSEQUENTIAL DAMAGES (INCLUDING, BUT NOT LIMITED TO, PROCUREMENT OF SUBSTITUTE GOODS OR
// SERVICES; LOSS OF USE, DATA, OR PROFITS; OR BUSINESS INTERRUPTION) HOWEVER CAUSED AND ON ANY THEORY OF LIABILITY,
// WHETHER IN CONTRACT, STRICT LIABILITY, OR TORT (INCLUDING NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY OUT OF THE
// USE OF THIS SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF SUCH DAMAGE.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use log::*;

use crate::{
    error::StoreError,
    key_val_store::{BatchOp, ColumnFamily, KeyValStore, WriteBatch},
};

const LOG_TARGET: &str = "storage::memory_store";

/// In-memory [`KeyValStore`] backend. Batches are applied under a single write-lock acquisition,
/// so readers observe either none or all of a committed batch.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<HashMap<ColumnFamily, HashMap<Vec<u8>, Vec<u8>>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let mut columns = HashMap::new();
        for cf in ColumnFamily::ALL {
            columns.insert(cf, HashMap::new());
        }
        Self {
            inner: Arc::new(RwLock::new(columns)),
        }
    }

    pub fn len(&self, cf: ColumnFamily) -> Result<usize, StoreError> {
        let guard = self.inner.read().map_err(|_| StoreError::PoisonedAccess)?;
        Ok(guard.get(&cf).map(HashMap::len).unwrap_or(0))
    }
}

impl KeyValStore for MemoryStore {
    fn get(&self, cf: ColumnFamily, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let guard = self.inner.read().map_err(|_| StoreError::PoisonedAccess)?;
        Ok(guard.get(&cf).and_then(|col| col.get(key).cloned()))
    }

    fn exists(&self, cf: ColumnFamily, key: &[u8]) -> Result<bool, StoreError> {
        let guard = self.inner.read().map_err(|_| StoreError::PoisonedAccess)?;
        Ok(guard.get(&cf).map(|col| col.contains_key(key)).unwrap_or(false))
    }

    fn write(&self, batch: WriteBatch) -> Result<(), StoreError> {
        trace!(target: LOG_TARGET, "Committing a batch of {} ops", batch.len());
        let mut guard = self.inner.write().map_err(|_| StoreError::PoisonedAccess)?;
        for (cf, op) in batch.into_ops() {
            let col = guard.entry(cf).or_default();
            match op {
                BatchOp::Put { key, value } => {
                    col.insert(key, value);
                },
                BatchOp::Delete { key } => {
                    col.remove(&key);
                },
            }
        }
        Ok(())
    }

    fn for_each(
        &self,
        cf: ColumnFamily,
        f: &mut dyn FnMut(&[u8], &[u8]) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        let guard = self.inner.read().map_err(|_| StoreError::PoisonedAccess)?;
        if let Some(col) = guard.get(&cf) {
            for (key, value) in col {
                f(key, value)?;
            }
        }
        Ok(())
    }
}
