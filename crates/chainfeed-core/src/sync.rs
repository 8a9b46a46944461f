//! The background sync task behind [`Provider::start`](crate::provider::Provider::start).
//!
//! Two cursors are kept: `from` (last block delivered on the reversible
//! stream) and `irreversible_from` (last block delivered on the irreversible
//! stream). Each iteration reads the chain properties, fetches one window of
//! blocks ending at most at the head, and emits every block in ascending
//! order.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::classifier::Classifier;
use crate::client::ChainClient;
use crate::config::ProviderConfig;
use crate::error::{ClientError, FeedError};
use crate::event::{Event, EventType};
use crate::provider::SyncState;
use crate::retry::RetryPolicy;
use crate::types::{parse_timestamp, Block, BlockContext, ChainProperties, RawBlock};

/// Page size for the genesis account listing.
const LOOKUP_ACCOUNTS_LIMIT: u16 = 1000;

/// Why the loop stopped.
#[derive(Debug)]
enum Halt {
    /// Cancelled, or every block receiver is gone.
    Cancelled,
    /// Unrecoverable error; reported on the error stream.
    Failed(FeedError),
}

pub(crate) struct SyncLoop<C: ChainClient> {
    pub(crate) client: Arc<C>,
    pub(crate) config: ProviderConfig,
    pub(crate) retry: RetryPolicy,
    pub(crate) classifier: Classifier,
    pub(crate) event_types: HashSet<EventType>,
    pub(crate) from: u32,
    pub(crate) irreversible_from: u32,
    pub(crate) blocks_tx: mpsc::Sender<Block>,
    pub(crate) irreversible_tx: mpsc::Sender<Block>,
    pub(crate) errors_tx: mpsc::Sender<FeedError>,
    pub(crate) cancel: CancellationToken,
    pub(crate) state: watch::Sender<SyncState>,
}

impl<C: ChainClient> SyncLoop<C> {
    /// Run until cancelled or failed. Dropping the senders on return closes
    /// every stream.
    pub(crate) async fn run(mut self) {
        match self.sync().await {
            Ok(()) | Err(Halt::Cancelled) => {
                self.set_state(SyncState::Draining);
                tracing::info!(
                    from = self.from,
                    irreversible_from = self.irreversible_from,
                    "Provider stopped"
                );
            }
            Err(Halt::Failed(err)) => {
                self.set_state(SyncState::Failed);
                tracing::error!(
                    from = self.from,
                    irreversible_from = self.irreversible_from,
                    error = %err,
                    "Provider failed"
                );
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => {}
                    res = self.errors_tx.send(err) => {
                        if res.is_err() {
                            tracing::debug!("error receiver dropped");
                        }
                    }
                }
            }
        }
    }

    async fn sync(&mut self) -> Result<(), Halt> {
        if self.from == 0 && self.event_types.contains(&EventType::AccountCreate) {
            self.genesis().await?;
        }

        loop {
            if self.cancel.is_cancelled() {
                return Err(Halt::Cancelled);
            }
            if self.blocks_tx.is_closed() && self.irreversible_tx.is_closed() {
                tracing::debug!("all block receivers dropped");
                return Err(Halt::Cancelled);
            }
            self.poll_once().await?;
        }
    }

    // ─── Genesis ─────────────────────────────────────────────────────────────

    /// Emit block 0 with one account-create event per existing account.
    async fn genesis(&mut self) -> Result<(), Halt> {
        self.set_state(SyncState::GenesisBackfill);

        let accounts = self.existing_accounts().await?;
        tracing::info!(accounts = accounts.len(), "Genesis backfill complete");

        let block = Block::genesis(accounts.into_iter().map(Event::account_create).collect());
        if block.is_empty() && !self.config.provide_empty_blocks {
            return Ok(());
        }
        self.emit(block, true, true).await
    }

    async fn existing_accounts(&self) -> Result<Vec<String>, Halt> {
        let client = Arc::clone(&self.client);
        let mut accounts = Vec::new();
        let mut lower_bound = String::new();

        loop {
            let bound = lower_bound.clone();
            let mut page = self
                .call("lookup_accounts", || {
                    client.lookup_accounts(&bound, LOOKUP_ACCOUNTS_LIMIT)
                })
                .await?;

            // Later pages start with the previous page's last name.
            if !lower_bound.is_empty() && page.first() == Some(&lower_bound) {
                page.remove(0);
            }

            match page.last() {
                Some(last) => lower_bound = last.clone(),
                None => break,
            }
            accounts.extend(page);
            tracing::debug!(total = accounts.len(), "fetched account page");
        }

        Ok(accounts)
    }

    // ─── Polling ─────────────────────────────────────────────────────────────

    async fn poll_once(&mut self) -> Result<(), Halt> {
        let client = Arc::clone(&self.client);
        let props = self
            .call("get_chain_properties", || client.chain_properties())
            .await?;

        if self.from >= props.head_block_number {
            self.set_state(SyncState::CaughtUp);
            return self.sleep(self.config.sync_interval()).await;
        }
        self.set_state(SyncState::Polling);

        let (offset, limit) = self.window(&props);
        let history = self
            .call("get_blocks", || client.blocks(offset, limit))
            .await?;

        let mut blocks: Vec<(u32, RawBlock)> = history.into_iter().collect();
        blocks.sort_unstable_by_key(|(num, _)| *num);
        let fetched = blocks.len();

        for (num, raw) in blocks {
            self.process_block(num, raw, props.last_irreversible_block_number)
                .await?;
        }

        tracing::debug!(
            head = props.head_block_number,
            lib = props.last_irreversible_block_number,
            offset,
            limit,
            fetched,
            from = self.from,
            irreversible_from = self.irreversible_from,
            "batch processed"
        );
        Ok(())
    }

    /// End block and size of the next history request.
    ///
    /// The window reaches back to the irreversible cursor (bounded by the
    /// configured maximum) so blocks that became final since they were first
    /// delivered are fetched again. It never extends past the head.
    fn window(&self, props: &ChainProperties) -> (u32, u32) {
        let head = props.head_block_number;
        let behind = self.irreversible_from.min(self.from);
        let limit = self
            .config
            .blocks_history_max_limit
            .max(1)
            .min(head.saturating_sub(behind));
        let offset = self.from.saturating_add(limit).min(head);
        (offset, limit)
    }

    async fn process_block(&mut self, num: u32, raw: RawBlock, lib: u32) -> Result<(), Halt> {
        let timestamp = parse_timestamp(&raw.timestamp).map_err(|source| {
            Halt::Failed(FeedError::Timestamp {
                block_num: num,
                value: raw.timestamp.clone(),
                source,
            })
        })?;

        let ctx = BlockContext {
            block_id: raw.block_id,
            block_num: num,
            timestamp,
        };
        let mut block = Block::new(num, timestamp);
        block.events = raw
            .operations
            .iter()
            .map(|op| self.classifier.classify(op, &ctx))
            .filter(|event| self.event_types.contains(&event.event_type()))
            .collect();

        let reversible = num > self.from;
        let irreversible = num <= lib && num > self.irreversible_from;

        if !block.is_empty() || self.config.provide_empty_blocks {
            self.emit(block, reversible, irreversible).await?;
        }

        if reversible {
            self.from = num;
        }
        if irreversible {
            self.irreversible_from = num;
        }
        Ok(())
    }

    // ─── Suspension points ───────────────────────────────────────────────────

    /// Deliver `block` on the selected streams, irreversible first.
    async fn emit(&self, block: Block, reversible: bool, irreversible: bool) -> Result<(), Halt> {
        match (reversible, irreversible) {
            (true, true) => {
                self.send(&self.irreversible_tx, block.clone()).await?;
                self.send(&self.blocks_tx, block).await
            }
            (false, true) => self.send(&self.irreversible_tx, block).await,
            (true, false) => self.send(&self.blocks_tx, block).await,
            (false, false) => Ok(()),
        }
    }

    /// Blocks until the consumer takes `block`. A dropped receiver is skipped.
    async fn send(&self, tx: &mpsc::Sender<Block>, block: Block) -> Result<(), Halt> {
        if tx.is_closed() {
            return Ok(());
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Halt::Cancelled),
            res = tx.send(block) => {
                if let Err(mpsc::error::SendError(block)) = res {
                    tracing::debug!(block = block.block_num, "block receiver dropped");
                }
                Ok(())
            }
        }
    }

    async fn call<T, F, Fut>(&self, operation: &'static str, f: F) -> Result<T, Halt>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Halt::Cancelled),
            res = self.retry.call(operation, f) => res.map_err(Halt::Failed),
        }
    }

    async fn sleep(&self, duration: Duration) -> Result<(), Halt> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Halt::Cancelled),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }

    fn set_state(&self, next: SyncState) {
        self.state.send_if_modified(|state| {
            if *state == next {
                return false;
            }
            tracing::debug!(from = %state, to = %next, "sync state changed");
            *state = next;
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashMap};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tokio::time::timeout;

    use super::*;
    use crate::builder::ProviderBuilder;
    use crate::operation::{Operation, TransferOperation, VoteOperation};
    use crate::provider::{Provider, Subscription};

    const WAIT: Duration = Duration::from_secs(5);

    // ─── Scripted node ───────────────────────────────────────────────────────

    #[derive(Default)]
    struct Chain {
        head: u32,
        lib: u32,
        blocks: BTreeMap<u32, RawBlock>,
        accounts: Vec<String>,
        /// Failures to return from `chain_properties` before succeeding.
        failing_props: u32,
        /// Node errors returned by `chain_properties`, in order, before `failing_props`.
        props_errors: Vec<ClientError>,
        /// Failures to return from `lookup_accounts` before succeeding.
        failing_lookups: u32,
        /// Every `(end_block, count)` passed to `blocks`.
        requests: Vec<(u32, u32)>,
        props_calls: u32,
    }

    #[derive(Default)]
    struct MockChain {
        chain: Mutex<Chain>,
        /// Accounts returned per page regardless of the requested limit.
        page_size: usize,
    }

    impl MockChain {
        fn with(f: impl FnOnce(&mut Chain)) -> Self {
            let mock = Self {
                page_size: 2,
                ..Default::default()
            };
            f(&mut mock.chain.lock().unwrap());
            mock
        }

        fn update(&self, f: impl FnOnce(&mut Chain)) {
            f(&mut self.chain.lock().unwrap());
        }

        fn requests(&self) -> Vec<(u32, u32)> {
            self.chain.lock().unwrap().requests.clone()
        }
    }

    #[async_trait]
    impl ChainClient for MockChain {
        async fn chain_properties(&self) -> Result<ChainProperties, ClientError> {
            let mut chain = self.chain.lock().unwrap();
            chain.props_calls += 1;
            if !chain.props_errors.is_empty() {
                return Err(chain.props_errors.remove(0));
            }
            if chain.failing_props > 0 {
                chain.failing_props -= 1;
                return Err(ClientError::Http("connection refused".into()));
            }
            Ok(ChainProperties::new(chain.head, chain.lib))
        }

        async fn blocks(
            &self,
            end_block: u32,
            count: u32,
        ) -> Result<HashMap<u32, RawBlock>, ClientError> {
            let mut chain = self.chain.lock().unwrap();
            chain.requests.push((end_block, count));
            let end = end_block.min(chain.head);
            let start = end.saturating_sub(count) + 1;
            Ok((start..=end)
                .filter_map(|n| chain.blocks.get(&n).map(|b| (n, b.clone())))
                .collect())
        }

        async fn lookup_accounts(
            &self,
            lower_bound: &str,
            _limit: u16,
        ) -> Result<Vec<String>, ClientError> {
            let mut chain = self.chain.lock().unwrap();
            if chain.failing_lookups > 0 {
                chain.failing_lookups -= 1;
                return Err(ClientError::Timeout { ms: 30_000 });
            }
            Ok(chain
                .accounts
                .iter()
                .filter(|a| a.as_str() >= lower_bound)
                .take(self.page_size)
                .cloned()
                .collect())
        }
    }

    fn vote(voter: &str, weight: i16) -> Operation {
        Operation::Vote(VoteOperation {
            voter: voter.into(),
            author: "author".into(),
            permlink: "post".into(),
            weight,
        })
    }

    fn transfer() -> Operation {
        Operation::Transfer(TransferOperation {
            from: "alice".into(),
            to: "bob".into(),
            amount: "1.000000000 SCR".into(),
            memo: String::new(),
        })
    }

    fn raw(num: u32, operations: Vec<Operation>) -> RawBlock {
        RawBlock {
            block_id: format!("{num:08x}"),
            timestamp: format!("2018-08-03T10:{:02}:{:02}", num / 20, (num * 3) % 60),
            operations,
        }
    }

    fn add_vote_blocks(chain: &mut Chain, nums: std::ops::RangeInclusive<u32>) {
        for n in nums {
            chain.blocks.insert(n, raw(n, vec![vote("voter", 100)]));
        }
    }

    fn fast() -> ProviderBuilder {
        ProviderBuilder::new()
            .sync_interval(Duration::from_millis(5))
            .retry_timeout(Duration::ZERO)
            .retry_limit(2)
    }

    fn shared(mock: MockChain) -> (Arc<MockChain>, Arc<MockChain>) {
        let mock = Arc::new(mock);
        (Arc::clone(&mock), mock)
    }

    async fn take(rx: &mut mpsc::Receiver<Block>, n: usize) -> Vec<u32> {
        let mut nums = Vec::with_capacity(n);
        while nums.len() < n {
            let block = timeout(WAIT, rx.recv())
                .await
                .expect("timed out waiting for a block")
                .expect("stream closed");
            nums.push(block.block_num);
        }
        nums
    }

    /// Collect `rev` reversible and `irr` irreversible block numbers.
    async fn collect(sub: &mut Subscription, rev: usize, irr: usize) -> (Vec<u32>, Vec<u32>) {
        tokio::join!(take(&mut sub.blocks, rev), take(&mut sub.irreversible, irr))
    }

    async fn wait_for(sub: &Subscription, state: SyncState) {
        let mut watch = sub.handle.state_watch();
        timeout(WAIT, watch.wait_for(|s| *s == state))
            .await
            .expect("timed out waiting for state")
            .expect("state sender dropped");
    }

    // ─── Ordering and cursors ────────────────────────────────────────────────

    #[tokio::test]
    async fn delivers_blocks_in_ascending_order() {
        let (mock, client) = shared(MockChain::with(|c| {
            c.head = 30;
            c.lib = 30;
            add_vote_blocks(c, 1..=30);
        }));
        let provider = fast().build_shared(client);
        let mut sub = provider.start(0, 0, [EventType::Vote]);

        let (rev, irr) = collect(&mut sub, 30, 30).await;
        let expected: Vec<u32> = (1..=30).collect();
        assert_eq!(rev, expected);
        assert_eq!(irr, expected);

        wait_for(&sub, SyncState::CaughtUp).await;
        assert_eq!(mock.requests()[0], (30, 30));
        sub.handle.cancel();
    }

    #[tokio::test]
    async fn irreversible_stream_waits_for_finality() {
        let (mock, client) = shared(MockChain::with(|c| {
            c.head = 10;
            c.lib = 6;
            add_vote_blocks(c, 1..=10);
        }));
        let provider = fast().build_shared(client);
        let mut sub = provider.start(0, 0, [EventType::Vote]);

        let (rev, irr) = collect(&mut sub, 10, 6).await;
        assert_eq!(rev, (1..=10).collect::<Vec<_>>());
        assert_eq!(irr, (1..=6).collect::<Vec<_>>());
        wait_for(&sub, SyncState::CaughtUp).await;

        // Two new blocks; 7..=10 become final.
        mock.update(|c| {
            add_vote_blocks(c, 11..=12);
            c.head = 12;
            c.lib = 10;
        });
        let (rev, irr) = collect(&mut sub, 2, 4).await;
        assert_eq!(rev, vec![11, 12]);
        assert_eq!(irr, vec![7, 8, 9, 10]);
        assert_eq!(mock.requests().last(), Some(&(12, 6)));
        sub.handle.cancel();
    }

    #[tokio::test]
    async fn caught_up_provider_is_idle() {
        let (mock, client) = shared(MockChain::with(|c| {
            c.head = 3;
            c.lib = 3;
            add_vote_blocks(c, 1..=3);
        }));
        let provider = fast().build_shared(client);
        let mut sub = provider.start(0, 0, [EventType::Vote]);

        collect(&mut sub, 3, 3).await;
        wait_for(&sub, SyncState::CaughtUp).await;
        let requests = mock.requests().len();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(sub.blocks.try_recv().is_err());
        assert!(sub.irreversible.try_recv().is_err());
        assert_eq!(mock.requests().len(), requests);
        assert_eq!(sub.handle.state(), SyncState::CaughtUp);
        sub.handle.cancel();
    }

    #[tokio::test]
    async fn batches_are_bounded() {
        let (mock, client) = shared(MockChain::with(|c| {
            c.head = 10;
            c.lib = 10;
            add_vote_blocks(c, 1..=10);
        }));
        let provider = fast().blocks_history_max_limit(3).build_shared(client);
        let mut sub = provider.start(0, 0, [EventType::Vote]);

        collect(&mut sub, 10, 10).await;
        wait_for(&sub, SyncState::CaughtUp).await;
        assert_eq!(mock.requests(), vec![(3, 3), (6, 3), (9, 3), (10, 1)]);
        sub.handle.cancel();
    }

    #[tokio::test]
    async fn irreversible_cursor_ahead_is_tolerated() {
        let (_mock, client) = shared(MockChain::with(|c| {
            c.head = 10;
            c.lib = 10;
            add_vote_blocks(c, 1..=10);
        }));
        let provider = fast().build_shared(client);
        let mut sub = provider.start(5, 8, [EventType::Vote]);

        let (rev, irr) = collect(&mut sub, 5, 2).await;
        assert_eq!(rev, vec![6, 7, 8, 9, 10]);
        assert_eq!(irr, vec![9, 10]);
        sub.handle.cancel();
    }

    // ─── Filtering ───────────────────────────────────────────────────────────

    #[tokio::test]
    async fn events_are_filtered_by_type() {
        let (_mock, client) = shared(MockChain::with(|c| {
            c.head = 1;
            c.lib = 1;
            c.blocks
                .insert(1, raw(1, vec![vote("a", 100), transfer(), vote("b", -100)]));
        }));
        let provider = fast().build_shared(client);
        let mut sub = provider.start(0, 0, [EventType::Vote, EventType::Flag]);

        let irr = timeout(WAIT, sub.irreversible.recv()).await.unwrap().unwrap();
        let block = timeout(WAIT, sub.blocks.recv()).await.unwrap().unwrap();
        assert_eq!(block, irr);
        let types: Vec<_> = block.events.iter().map(Event::event_type).collect();
        assert_eq!(types, vec![EventType::Vote, EventType::Flag]);
        assert_eq!(block.block_num, 1);
        assert_eq!(
            block.timestamp,
            parse_timestamp("2018-08-03T10:00:03").unwrap()
        );
        sub.handle.cancel();
    }

    #[tokio::test]
    async fn empty_blocks_are_skipped_but_consumed() {
        let (mock, client) = shared(MockChain::with(|c| {
            c.head = 3;
            c.lib = 3;
            c.blocks.insert(1, raw(1, vec![vote("a", 100)]));
            c.blocks.insert(2, raw(2, vec![transfer()]));
            c.blocks.insert(3, raw(3, vec![vote("b", 100)]));
        }));
        let provider = fast().build_shared(client);
        let mut sub = provider.start(0, 0, [EventType::Vote]);

        let (rev, irr) = collect(&mut sub, 2, 2).await;
        assert_eq!(rev, vec![1, 3]);
        assert_eq!(irr, vec![1, 3]);
        wait_for(&sub, SyncState::CaughtUp).await;

        mock.update(|c| {
            add_vote_blocks(c, 4..=4);
            c.head = 4;
            c.lib = 4;
        });
        let (rev, _) = collect(&mut sub, 1, 1).await;
        assert_eq!(rev, vec![4]);
        assert_eq!(mock.requests().last(), Some(&(4, 1)));
        sub.handle.cancel();
    }

    #[tokio::test]
    async fn empty_blocks_are_provided_when_enabled() {
        let (_mock, client) = shared(MockChain::with(|c| {
            c.head = 3;
            c.lib = 0;
            c.blocks.insert(1, raw(1, vec![vote("a", 100)]));
            c.blocks.insert(2, raw(2, vec![transfer()]));
            c.blocks.insert(3, raw(3, vec![]));
        }));
        let provider = fast().provide_empty_blocks(true).build_shared(client);
        let mut sub = provider.start(0, 0, [EventType::Vote]);

        let mut blocks = Vec::new();
        for _ in 0..3 {
            blocks.push(timeout(WAIT, sub.blocks.recv()).await.unwrap().unwrap());
        }
        assert_eq!(blocks.iter().map(|b| b.block_num).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(blocks[0].events.len(), 1);
        assert!(blocks[1].is_empty());
        assert!(blocks[2].is_empty());
        assert!(sub.irreversible.try_recv().is_err());
        sub.handle.cancel();
    }

    // ─── Genesis ─────────────────────────────────────────────────────────────

    fn accounts(chain: &mut Chain) {
        chain.accounts = ["alice", "bob", "carol", "dave", "erin"]
            .iter()
            .map(|s| s.to_string())
            .collect();
    }

    #[tokio::test]
    async fn genesis_lists_every_account_once() {
        let (_mock, client) = shared(MockChain::with(accounts));
        let provider = fast().build_shared(client);
        let mut sub = provider.start(0, 0, [EventType::AccountCreate]);

        let irr = timeout(WAIT, sub.irreversible.recv()).await.unwrap().unwrap();
        let rev = timeout(WAIT, sub.blocks.recv()).await.unwrap().unwrap();
        assert_eq!(rev, irr);
        assert_eq!(rev.block_num, 0);

        let names: Vec<_> = rev
            .events
            .iter()
            .map(|e| match e {
                Event::AccountCreate(a) => a.account.clone(),
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(names, vec!["alice", "bob", "carol", "dave", "erin"]);

        wait_for(&sub, SyncState::CaughtUp).await;
        sub.handle.cancel();
    }

    #[tokio::test]
    async fn genesis_requires_account_create_and_block_zero() {
        let (_mock, client) = shared(MockChain::with(accounts));
        let provider = fast().build_shared(client);

        let mut sub = provider.start(0, 0, [EventType::Vote]);
        wait_for(&sub, SyncState::CaughtUp).await;
        assert!(sub.blocks.try_recv().is_err());
        sub.handle.cancel();

        let mut sub = provider.start(1, 1, [EventType::AccountCreate]);
        wait_for(&sub, SyncState::CaughtUp).await;
        assert!(sub.blocks.try_recv().is_err());
        sub.handle.cancel();
    }

    #[tokio::test]
    async fn genesis_failure_stops_the_provider() {
        let (_mock, client) = shared(MockChain::with(|c| {
            accounts(c);
            c.failing_lookups = u32::MAX;
        }));
        let provider = fast().retry_limit(1).build_shared(client);
        let mut sub = provider.start(0, 0, [EventType::AccountCreate]);

        let err = timeout(WAIT, sub.errors.recv()).await.unwrap().unwrap();
        match err {
            FeedError::RetryExhausted {
                operation,
                attempts,
                ..
            } => {
                assert_eq!(operation, "lookup_accounts");
                assert_eq!(attempts, 2);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(timeout(WAIT, sub.blocks.recv()).await.unwrap().is_none());
        assert!(timeout(WAIT, sub.irreversible.recv()).await.unwrap().is_none());
        assert_eq!(sub.handle.state(), SyncState::Failed);
    }

    #[tokio::test]
    async fn genesis_without_accounts_is_empty() {
        let (_mock, client) = shared(MockChain::default());
        let provider = fast().build_shared(client);
        let mut sub = provider.start(0, 0, [EventType::AccountCreate]);
        wait_for(&sub, SyncState::CaughtUp).await;
        assert!(sub.blocks.try_recv().is_err());
        assert!(sub.irreversible.try_recv().is_err());
        sub.handle.cancel();

        let (_mock, client) = shared(MockChain::default());
        let provider = fast().provide_empty_blocks(true).build_shared(client);
        let mut sub = provider.start(0, 0, [EventType::AccountCreate]);
        let irr = timeout(WAIT, sub.irreversible.recv()).await.unwrap().unwrap();
        let rev = timeout(WAIT, sub.blocks.recv()).await.unwrap().unwrap();
        assert_eq!(rev, irr);
        assert_eq!(rev.block_num, 0);
        assert!(rev.is_empty());
        sub.handle.cancel();
    }

    // ─── Failure and shutdown ────────────────────────────────────────────────

    #[tokio::test]
    async fn node_errors_are_retried() {
        let (mock, client) = shared(MockChain::with(|c| {
            c.props_errors = vec![
                ClientError::Rpc {
                    code: -32000,
                    message: "node busy".into(),
                },
                ClientError::Decode("unexpected end of input".into()),
            ];
            c.head = 1;
            c.lib = 1;
            add_vote_blocks(c, 1..=1);
        }));
        let provider = fast().retry_limit(3).build_shared(client);
        let mut sub = provider.start(0, 0, [EventType::Vote]);

        let (rev, irr) = collect(&mut sub, 1, 1).await;
        assert_eq!((rev, irr), (vec![1], vec![1]));
        assert!(sub.errors.try_recv().is_err());
        assert!(mock.chain.lock().unwrap().props_calls >= 3);
        assert_ne!(sub.handle.state(), SyncState::Failed);
        sub.handle.cancel();
    }


    #[tokio::test]
    async fn exhausted_retries_are_reported() {
        let (mock, client) = shared(MockChain::with(|c| c.failing_props = u32::MAX));
        let provider = fast().build_shared(client);
        let mut sub = provider.start(0, 0, [EventType::Vote]);

        let err = timeout(WAIT, sub.errors.recv()).await.unwrap().unwrap();
        match err {
            FeedError::RetryExhausted {
                operation,
                attempts,
                ..
            } => {
                assert_eq!(operation, "get_chain_properties");
                assert_eq!(attempts, 3);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(timeout(WAIT, sub.blocks.recv()).await.unwrap().is_none());
        assert_eq!(sub.handle.state(), SyncState::Failed);
        assert_eq!(mock.chain.lock().unwrap().props_calls, 3);
    }

    #[tokio::test]
    async fn transient_failures_are_absorbed() {
        let (_mock, client) = shared(MockChain::with(|c| {
            c.failing_props = 2;
            c.head = 1;
            c.lib = 1;
            add_vote_blocks(c, 1..=1);
        }));
        let provider = fast().build_shared(client);
        let mut sub = provider.start(0, 0, [EventType::Vote]);

        let (rev, irr) = collect(&mut sub, 1, 1).await;
        assert_eq!((rev, irr), (vec![1], vec![1]));
        assert!(sub.errors.try_recv().is_err());
        sub.handle.cancel();
    }

    #[tokio::test]
    async fn malformed_timestamp_stops_the_provider() {
        let (_mock, client) = shared(MockChain::with(|c| {
            c.head = 2;
            c.lib = 2;
            add_vote_blocks(c, 1..=1);
            let mut bad = raw(2, vec![vote("a", 1)]);
            bad.timestamp = "yesterday".into();
            c.blocks.insert(2, bad);
        }));
        let provider = fast().build_shared(client);
        let mut sub = provider.start(0, 0, [EventType::Vote]);

        collect(&mut sub, 1, 1).await;
        let err = timeout(WAIT, sub.errors.recv()).await.unwrap().unwrap();
        match err {
            FeedError::Timestamp {
                block_num, value, ..
            } => {
                assert_eq!(block_num, 2);
                assert_eq!(value, "yesterday");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(sub.handle.state(), SyncState::Failed);
    }

    #[tokio::test]
    async fn cancel_stops_a_blocked_provider() {
        let (_mock, client) = shared(MockChain::with(|c| {
            c.head = 5;
            c.lib = 5;
            add_vote_blocks(c, 1..=5);
        }));
        let provider = fast().build_shared(client);
        let Subscription {
            blocks: _blocks,
            irreversible: _irreversible,
            mut errors,
            handle,
        } = provider.start(0, 0, [EventType::Vote]);

        // Receivers are held but never read, so the task parks in a send.
        let watch = handle.state_watch();
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.cancel();
        timeout(WAIT, handle.join()).await.unwrap().unwrap();

        assert_eq!(*watch.borrow(), SyncState::Draining);
        assert!(errors.try_recv().is_err());
    }

    #[tokio::test]
    async fn external_token_cancels() {
        let (_mock, client) = shared(MockChain::default());
        let provider = Provider::with_classifier(client, ProviderConfig::default(), Classifier::new());
        let token = CancellationToken::new();
        let sub = provider.start_with_cancel(0, 0, [EventType::Vote], token.clone());

        token.cancel();
        let watch = sub.handle.state_watch();
        timeout(WAIT, sub.handle.join()).await.unwrap().unwrap();
        assert_eq!(*watch.borrow(), SyncState::Draining);
    }

    #[tokio::test]
    async fn dropping_every_receiver_ends_the_task() {
        let (_mock, client) = shared(MockChain::with(|c| {
            c.head = 50;
            c.lib = 50;
            add_vote_blocks(c, 1..=50);
        }));
        let provider = fast().build_shared(client);
        let Subscription {
            blocks,
            irreversible,
            handle,
            ..
        } = provider.start(0, 0, [EventType::Vote]);

        drop(blocks);
        drop(irreversible);
        timeout(WAIT, handle.join()).await.unwrap().unwrap();
    }
}
