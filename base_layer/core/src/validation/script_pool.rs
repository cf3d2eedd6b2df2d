// Copyright 2024. The Tari Project
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

//! Parallel script validation.
//!
//! A batch of (transaction, input) items is validated by a pool of scoped worker threads. The dispatcher alternates
//! between handing out work and collecting results over rendezvous channels. The first failure cancels the batch:
//! the quit channel is closed, which wakes every worker, and the failure is returned. The pool only lives for one
//! batch.

use std::{
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
};

use crossbeam_channel::{bounded, select, Receiver, Sender};
use log::*;

use crate::{
    blocks::Block,
    chain_storage::{ChainStorageError, TxStore},
    script::{HashCache, ScriptContext, ScriptEngine, ScriptError, ScriptFlags, SigCache, TxSigHashes},
    transactions::Transaction,
    validation::ValidationError,
};

const LOG_TARGET: &str = "c::val::script_pool";

/// Number of workers started per available core
const WORKERS_PER_CORE: usize = 3;

/// One input to validate. Cloning is cheap, everything is shared.
#[derive(Debug, Clone)]
pub struct ScriptWorkItem {
    pub tx: Arc<Transaction>,
    pub input_index: usize,
    pub sig_hashes: Arc<TxSigHashes>,
}

impl ScriptWorkItem {
    /// Work items for every input of a non-coinbase transaction. The signature midstate of a witness transaction is
    /// taken from (and added to) the hash cache.
    pub fn for_transaction(tx: &Arc<Transaction>, hash_cache: &HashCache) -> Vec<ScriptWorkItem> {
        if tx.is_coinbase() {
            return Vec::new();
        }
        let sig_hashes = if tx.has_witness() {
            hash_cache.get_or_add(tx)
        } else {
            Arc::new(TxSigHashes::new(tx))
        };
        (0..tx.inputs.len())
            .map(|input_index| ScriptWorkItem {
                tx: tx.clone(),
                input_index,
                sig_hashes: sig_hashes.clone(),
            })
            .collect()
    }

    /// Work items for every input of every transaction of the block, except the coinbase
    pub fn for_block(block: &Block, hash_cache: &HashCache) -> Vec<ScriptWorkItem> {
        block
            .transactions
            .iter()
            .flat_map(|tx| Self::for_transaction(tx, hash_cache))
            .collect()
    }
}

type WorkResult = Result<(), ChainStorageError>;

enum DispatchStep {
    Sent,
    Received(WorkResult),
}

/// Validates script work items against the outputs they spend, which must all be in the transaction store.
pub struct ScriptValidationPool {
    store: Arc<TxStore>,
    flags: ScriptFlags,
    engine: Arc<dyn ScriptEngine>,
    sig_cache: Arc<SigCache>,
}

impl ScriptValidationPool {
    pub fn new(store: Arc<TxStore>, flags: ScriptFlags, engine: Arc<dyn ScriptEngine>, sig_cache: Arc<SigCache>) -> Self {
        Self {
            store,
            flags,
            engine,
            sig_cache,
        }
    }

    /// Validates every item. Returns the first failure, in which case the remaining items may not have been run.
    pub fn validate(&self, items: Vec<ScriptWorkItem>) -> Result<(), ChainStorageError> {
        if items.is_empty() {
            return Ok(());
        }
        let num_workers = num_cpus::get()
            .saturating_mul(WORKERS_PER_CORE)
            .min(items.len())
            .max(1);
        trace!(
            target: LOG_TARGET,
            "Validating {} scripts with {} workers",
            items.len(),
            num_workers
        );

        let (work_tx, work_rx) = bounded::<ScriptWorkItem>(0);
        let (result_tx, result_rx) = bounded::<WorkResult>(0);
        let (quit_tx, quit_rx) = bounded::<()>(0);
        let cancelled = AtomicBool::new(false);

        thread::scope(|scope| {
            let workers = (0..num_workers)
                .map(|_| {
                    let work_rx = work_rx.clone();
                    let result_tx = result_tx.clone();
                    let quit_rx = quit_rx.clone();
                    let cancelled = &cancelled;
                    scope.spawn(move || self.run_worker(work_rx, result_tx, quit_rx, cancelled))
                })
                .collect::<Vec<_>>();
            drop(result_tx);

            let outcome = Self::dispatch(items, &work_tx, &result_rx);
            if outcome.is_err() {
                cancelled.store(true, Ordering::Release);
            }
            drop(quit_tx);
            drop(work_tx);

            let mut outcome = outcome;
            for worker in workers {
                if worker.join().is_err() && outcome.is_ok() {
                    outcome = Err(ChainStorageError::ScriptWorkerFailed(
                        "A script validation worker panicked".to_string(),
                    ));
                }
            }
            outcome
        })
    }

    fn dispatch(
        items: Vec<ScriptWorkItem>,
        work_tx: &Sender<ScriptWorkItem>,
        result_rx: &Receiver<WorkResult>,
    ) -> Result<(), ChainStorageError> {
        let total = items.len();
        let mut items = items.into_iter();
        let mut next = items.next();
        let mut num_processed = 0;
        let workers_gone = || ChainStorageError::ScriptWorkerFailed("All script validation workers exited".to_string());

        while num_processed < total {
            let step = match &next {
                Some(item) => select! {
                    send(work_tx, item.clone()) -> res => res.map(|_| DispatchStep::Sent).map_err(|_| ()),
                    recv(result_rx) -> res => res.map(DispatchStep::Received).map_err(|_| ()),
                },
                None => result_rx.recv().map(DispatchStep::Received).map_err(|_| ()),
            };
            match step.map_err(|_| workers_gone())? {
                DispatchStep::Sent => next = items.next(),
                DispatchStep::Received(result) => {
                    num_processed += 1;
                    result?;
                },
            }
        }
        Ok(())
    }

    fn run_worker(
        &self,
        work_rx: Receiver<ScriptWorkItem>,
        result_tx: Sender<WorkResult>,
        quit_rx: Receiver<()>,
        cancelled: &AtomicBool,
    ) {
        loop {
            let item = select! {
                recv(work_rx) -> item => item.ok(),
                recv(quit_rx) -> _ => None,
            };
            let item = match item {
                Some(item) if !cancelled.load(Ordering::Acquire) => item,
                _ => return,
            };
            let result = self.run_item(&item);
            let delivered = select! {
                send(result_tx, result) -> res => res.is_ok(),
                recv(quit_rx) -> _ => false,
            };
            if !delivered {
                return;
            }
        }
    }

    /// Runs one item. A panic in the script engine is turned into an error so the dispatcher always gets a result.
    fn run_item(&self, item: &ScriptWorkItem) -> WorkResult {
        match panic::catch_unwind(AssertUnwindSafe(|| self.validate_item(item))) {
            Ok(result) => result.map_err(ChainStorageError::from),
            Err(_) => {
                error!(
                    target: LOG_TARGET,
                    "Script validation panicked on input {} of transaction {}",
                    item.input_index,
                    item.tx.hash()
                );
                Err(ChainStorageError::ScriptWorkerFailed(format!(
                    "Script validation panicked on input {} of transaction {}",
                    item.input_index,
                    item.tx.hash()
                )))
            },
        }
    }

    fn validate_item(&self, item: &ScriptWorkItem) -> Result<(), ValidationError> {
        let tx_hash = item.tx.hash();
        let input = item.tx.inputs.get(item.input_index).ok_or_else(|| {
            ValidationError::BadTxInput(format!(
                "Transaction {} has no input {}",
                tx_hash, item.input_index
            ))
        })?;
        let outpoint = &input.previous_output;
        let origin = self
            .store
            .get(&outpoint.hash)
            .and_then(|data| data.tx.as_ref())
            .ok_or(ValidationError::MissingTx {
                tx: tx_hash,
                missing: outpoint.hash,
            })?;
        let output = origin.outputs.get(outpoint.index as usize).ok_or_else(|| {
            ValidationError::BadTxInput(format!(
                "Input {} of transaction {} references output {} which is out of range",
                item.input_index, tx_hash, outpoint
            ))
        })?;

        let context = ScriptContext {
            pk_script: &output.pk_script,
            tx: &item.tx,
            input_index: item.input_index,
            flags: self.flags,
            sig_cache: &self.sig_cache,
            sig_hashes: &item.sig_hashes,
            input_value: output.value,
        };
        self.engine.execute(&context).map_err(|err| {
            debug!(
                target: LOG_TARGET,
                "Script validation failed for input {} of transaction {}: {}", item.input_index, tx_hash, err
            );
            match err {
                ScriptError::Malformed(reason) => ValidationError::ScriptMalformed {
                    tx: tx_hash,
                    input: item.input_index,
                    reason,
                },
                source => ValidationError::ScriptValidation {
                    tx: tx_hash,
                    input: item.input_index,
                    source,
                },
            }
        })
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::{
        chain_storage::TxData,
        transactions::{OutPoint, TxInput, TxOutput},
    };

    #[derive(Default)]
    struct CountingEngine {
        calls: AtomicUsize,
        reject_script: Option<Vec<u8>>,
    }

    impl ScriptEngine for CountingEngine {
        fn execute(&self, context: &ScriptContext<'_>) -> Result<(), ScriptError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.reject_script {
                Some(script) if script.as_slice() == context.pk_script => Err(ScriptError::EvalFalse),
                _ => Ok(()),
            }
        }
    }

    fn setup(num_inputs: usize, bad_output: Option<usize>) -> (Arc<TxStore>, Vec<ScriptWorkItem>) {
        let outputs = (0..num_inputs)
            .map(|i| {
                let script = if Some(i) == bad_output { vec![0x00] } else { vec![0x51] };
                TxOutput::new(10, script)
            })
            .collect();
        let origin = Arc::new(Transaction::new(
            1,
            vec![TxInput::new(OutPoint::new([1; 32].into(), 0), vec![])],
            outputs,
            0,
        ));
        let spend = Arc::new(Transaction::new(
            1,
            (0..num_inputs)
                .map(|i| TxInput::new(OutPoint::new(origin.hash(), i as u32), vec![]))
                .collect(),
            vec![TxOutput::new(1, vec![0x51])],
            0,
        ));
        let mut store = TxStore::new();
        store.insert(origin.hash(), TxData::new(origin, 1));
        let items = ScriptWorkItem::for_transaction(&spend, &HashCache::new());
        (Arc::new(store), items)
    }

    fn pool(store: Arc<TxStore>, engine: Arc<CountingEngine>) -> ScriptValidationPool {
        ScriptValidationPool::new(store, ScriptFlags::empty(), engine, Arc::new(SigCache::new(100)))
    }

    #[test]
    fn validates_every_input() {
        let (store, items) = setup(50, None);
        let engine = Arc::new(CountingEngine::default());
        pool(store, engine.clone()).validate(items).unwrap();
        assert_eq!(engine.calls.load(Ordering::SeqCst), 50);
    }

    #[test]
    fn fails_fast_on_the_first_bad_input() {
        let (store, items) = setup(50, Some(7));
        let engine = Arc::new(CountingEngine {
            calls: AtomicUsize::new(0),
            reject_script: Some(vec![0x00]),
        });
        let err = pool(store, engine).validate(items).unwrap_err();
        assert!(matches!(
            err.validation_error(),
            Some(ValidationError::ScriptValidation { input: 7, .. })
        ));
    }

    #[test]
    fn missing_and_out_of_range_origins() {
        let (_, items) = setup(2, None);
        let engine = Arc::new(CountingEngine::default());
        let err = pool(Arc::new(TxStore::new()), engine.clone())
            .validate(items.clone())
            .unwrap_err();
        assert!(matches!(err.validation_error(), Some(ValidationError::MissingTx { .. })));

        let (store, mut items) = setup(2, None);
        let mut tx = items[1].tx.as_ref().clone();
        // An index equal to the number of outputs is out of range
        tx.inputs[1].previous_output.index = 2;
        items[1].tx = Arc::new(tx);
        let err = pool(store, engine).validate(items).unwrap_err();
        assert!(matches!(err.validation_error(), Some(ValidationError::BadTxInput(_))));
    }

    struct PanickingEngine {
        panic_on_input: usize,
    }

    impl ScriptEngine for PanickingEngine {
        fn execute(&self, context: &ScriptContext<'_>) -> Result<(), ScriptError> {
            if context.input_index == self.panic_on_input {
                panic!("engine failure on input {}", context.input_index);
            }
            Ok(())
        }
    }

    #[test]
    fn a_panicking_engine_fails_the_batch() {
        let (store, items) = setup(40, None);
        let engine = Arc::new(PanickingEngine { panic_on_input: 3 });
        let pool = ScriptValidationPool::new(store, ScriptFlags::empty(), engine, Arc::new(SigCache::new(100)));
        let err = pool.validate(items).unwrap_err();
        assert!(matches!(err, ChainStorageError::ScriptWorkerFailed(_)));
        assert!(err.validation_error().is_none());
    }

    #[test]
    fn empty_batches_pass() {
        let engine = Arc::new(CountingEngine::default());
        assert!(pool(Arc::new(TxStore::new()), engine).validate(Vec::new()).is_ok());
    }
}
