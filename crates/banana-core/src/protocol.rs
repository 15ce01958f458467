//! The `Banana` connection driver: owns one connection's encode and
//! decode pumps and ties the slicer/unslicer stacks to the byte-level
//! token codec in `banana_wire`.
//!
//! Encoding and decoding are independent state machines living side by
//! side in the same struct (a Banana connection is full-duplex): the
//! encode pump drains a queue of application values (and, interleaved,
//! any vocabulary-table control frames) into an output byte buffer one
//! `Atom` at a time; the decode pump feeds received bytes through the
//! token decoder and assembles them into `Value`s via the unslicer
//! stack, one token at a time, suspending cleanly when a token is only
//! partially buffered.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use bytes::{Bytes, BytesMut};
use num_bigint::{BigInt, BigUint, Sign};
use num_traits::ToPrimitive;
use tracing::{debug, debug_span, error, trace, warn};

use banana_wire::{encoder, IncomingVocab, OutgoingVocab, ReceiveBuffer, Token, TokenDecoder, VocabTableIndex};

use crate::constraint::Constraint;
use crate::error::{BananaError, BananaResult, StepError, Violation};
use crate::opentype;
use crate::registry::{ClassRegistry, Mode};
use crate::slicer::reference::ReferenceSlicer;
use crate::slicer::root::{self as slicer_root, ReferenceTable as EncodeReferenceTable, RootSlicer, SlicerDispatch};
use crate::slicer::vocab::{AddVocabSlicer, ReplaceVocabSlicer};
use crate::slicer::{Atom, AwaitToken, SliceStep, Slicer};
use crate::unslicer::root::{dispatch_open, ReferenceTable as DecodeReferenceTable, UnslicerContext};
use crate::unslicer::vocab::{AddVocabUnslicer, ReplaceVocabUnslicer};
use crate::unslicer::{PatchSite, Unslicer};
use crate::value::Value;

/// Knobs controlling one connection's protocol behavior.
#[derive(Debug, Clone)]
pub struct BananaConfig {
    /// Maximum header length the token decoder will scan before giving
    /// up on a malformed stream.
    pub prefix_limit: usize,
    /// The initial vocabulary table both directions start from.
    pub initial_vocab_table: VocabTableIndex,
    /// Whether unsafe-mode opentypes are accepted/emitted.
    pub mode: Mode,
    /// Maximum nesting depth either stack will build before refusing to
    /// go deeper. `None` means uncapped.
    pub max_frame_depth: Option<usize>,
}

impl Default for BananaConfig {
    fn default() -> Self {
        Self { prefix_limit: 64, initial_vocab_table: VocabTableIndex::V1, mode: Mode::Safe, max_frame_depth: None }
    }
}

/// Identifies one top-level [`Banana::send`] call, so its eventual
/// [`SendOutcome`] can be matched back to the value that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SendHandle(u64);

/// What became of a previously queued [`Banana::send`].
#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    /// The value, and everything nested under it, was fully encoded.
    Sent,
    /// The value's own top-level frame was aborted by a [`Violation`]
    /// partway through encoding; an `ABORT` token stands in its place
    /// on the wire (or, if the violation struck before any byte was
    /// written, nothing was emitted for it at all).
    Aborted(Violation),
}

/// One thing that happened on a connection, surfaced through
/// [`Banana::poll_event`].
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A complete top-level value arrived from the peer.
    Received(Value),
    /// A queued [`Banana::send`] reached a terminal outcome.
    Sent(SendHandle, SendOutcome),
    /// A violation was reported and its frame discarded; the connection
    /// continues, but the value it would have produced never arrived.
    ViolationReported(Violation),
}

enum VocabRequest {
    Replace(Vec<(u64, Vec<u8>)>),
    Add(u64, Vec<u8>),
}

enum PostClose {
    ReplaceVocab(Vec<(u64, Vec<u8>)>),
}

struct EncodeFrame {
    slicer: Box<dyn Slicer>,
    /// The value this frame was built from, if it has a stable
    /// identity that needs binding into [`EncodeReferenceTable`] once
    /// this frame's `OPEN` is actually emitted and a frame id assigned.
    origin: Option<Value>,
    /// Assigned once this frame's `OPEN` atom has been emitted.
    refid: Option<u64>,
}

/// A wrapper around the decode-side unslicer for one open frame,
/// special-casing the two vocabulary-negotiation opentypes so the
/// driver can read back their collected table once the frame closes
/// (the generic [`Unslicer`] trait has no way to hand that back through
/// a produced [`Value`], since both frames just produce [`Value::None`]).
enum DecodeUnslicer {
    Generic(Box<dyn Unslicer>),
    ReplaceVocab(ReplaceVocabUnslicer),
    AddVocab(AddVocabUnslicer),
}

impl DecodeUnslicer {
    fn path(&self) -> &str {
        match self {
            Self::Generic(u) => u.path(),
            Self::ReplaceVocab(u) => u.path(),
            Self::AddVocab(u) => u.path(),
        }
    }

    fn receive_child(&mut self, child: Value) -> crate::error::StepResult<()> {
        match self {
            Self::Generic(u) => u.receive_child(child),
            Self::ReplaceVocab(u) => u.receive_child(child),
            Self::AddVocab(u) => u.receive_child(child),
        }
    }

    fn receive_close(&mut self) -> crate::error::StepResult<Value> {
        match self {
            Self::Generic(u) => u.receive_close(),
            Self::ReplaceVocab(u) => u.receive_close(),
            Self::AddVocab(u) => u.receive_close(),
        }
    }

    fn report_violation(&mut self, violation: Violation) -> Option<Violation> {
        match self {
            Self::Generic(u) => u.report_violation(violation),
            Self::ReplaceVocab(u) => u.report_violation(violation),
            Self::AddVocab(u) => u.report_violation(violation),
        }
    }

    fn last_child_site(&self) -> Option<PatchSite> {
        match self {
            Self::Generic(u) => u.last_child_site(),
            Self::ReplaceVocab(u) => u.last_child_site(),
            Self::AddVocab(u) => u.last_child_site(),
        }
    }
}

struct DecodeFrame {
    unslicer: DecodeUnslicer,
    refid: u64,
    /// The constraint governing each child delivered to this frame,
    /// computed once from whatever constraint validated this frame's
    /// own opentype (e.g. a `ListOf`'s `element`). `None` when nothing
    /// narrower than "anything" applies.
    child_constraint: Option<Rc<dyn Constraint>>,
}

/// How far into a discarded region of the token stream decoding
/// currently is. While discarding, every token is consumed and ignored
/// except for the `OPEN`/`CLOSE` balance needed to find where the
/// discarded region ends.
#[derive(Debug, Clone, Copy)]
struct DiscardState {
    /// Net `OPEN`s seen (without a matching `CLOSE` yet) since the
    /// current failed frame's own region began.
    depth: usize,
    /// How many additional failed frames' own `CLOSE` tokens, beyond
    /// the one `depth` is tracking, still haven't arrived. Nonzero only
    /// when a violation propagated through more than one ancestor frame
    /// (each of which also decided to fail).
    frames_remaining: usize,
}

/// One full-duplex Banana connection: an encode pump draining queued
/// sends into an output buffer, and a decode pump turning received
/// bytes into delivered values and events.
///
/// Not `Send`: every piece of shared state (`Rc<RefCell<_>>` reference
/// tables, `Rc<dyn Constraint>` trees) is single-threaded by
/// construction, matching the fact that a connection's slicer/unslicer
/// stacks are driven by exactly one task at a time.
pub struct Banana {
    config: BananaConfig,
    class_registry: Rc<ClassRegistry>,

    // Encode side.
    root_slicer: RootSlicer,
    send_handles: VecDeque<SendHandle>,
    next_send_id: u64,
    vocab_queue: VecDeque<VocabRequest>,
    encode_stack: Vec<EncodeFrame>,
    encode_refs: EncodeReferenceTable,
    next_frame_id: u64,
    outgoing_vocab: OutgoingVocab,
    output: BytesMut,
    current_send: Option<SendHandle>,
    pending_vocab_flip: Option<PostClose>,

    // Decode side.
    decoder: TokenDecoder,
    incoming_vocab: IncomingVocab,
    recv_buf: ReceiveBuffer,
    decode_stack: Vec<DecodeFrame>,
    decode_refs: Rc<RefCell<DecodeReferenceTable>>,
    awaiting_opentype: Option<u64>,
    discard: Option<DiscardState>,
    root_constraint: Option<Rc<dyn Constraint>>,

    events: VecDeque<Event>,
    disconnect_reason: Option<BananaError>,
}

impl Banana {
    /// Build a fresh connection, accepting unsafe-mode instances only
    /// for classes already registered in `class_registry`.
    #[must_use]
    pub fn new(config: BananaConfig, class_registry: ClassRegistry) -> Self {
        let outgoing_vocab = OutgoingVocab::from_initial(config.initial_vocab_table);
        let incoming_vocab = IncomingVocab::from_initial(config.initial_vocab_table);
        let decoder = TokenDecoder::with_prefix_limit(config.prefix_limit);
        Self {
            config,
            class_registry: Rc::new(class_registry),

            root_slicer: RootSlicer::new(),
            send_handles: VecDeque::new(),
            next_send_id: 0,
            vocab_queue: VecDeque::new(),
            encode_stack: Vec::new(),
            encode_refs: EncodeReferenceTable::new(),
            next_frame_id: 0,
            outgoing_vocab,
            output: BytesMut::new(),
            current_send: None,
            pending_vocab_flip: None,

            decoder,
            incoming_vocab,
            recv_buf: ReceiveBuffer::new(),
            decode_stack: Vec::new(),
            decode_refs: Rc::new(RefCell::new(DecodeReferenceTable::new())),
            awaiting_opentype: None,
            discard: None,
            root_constraint: None,

            events: VecDeque::new(),
            disconnect_reason: None,
        }
    }

    /// Queue `value` to be sliced and sent, returning a handle its
    /// eventual [`SendOutcome`] will arrive tagged with.
    pub fn send(&mut self, value: Value) -> SendHandle {
        let handle = SendHandle(self.next_send_id);
        self.next_send_id += 1;
        self.root_slicer.enqueue(value);
        self.send_handles.push_back(handle);
        self.drive_encode();
        handle
    }

    /// Allocate a new outgoing vocabulary index for `word` and queue the
    /// `add-vocab` control frame announcing it. The index is allocated
    /// immediately (not deferred to the frame closing) so the new entry
    /// can itself be referenced by anything sent afterward.
    pub fn add_vocab(&mut self, word: Vec<u8>) {
        let index = self.outgoing_vocab.add(word.clone());
        self.vocab_queue.push_back(VocabRequest::Add(index, word));
        self.drive_encode();
    }

    /// Queue a `set-vocab` control frame replacing the entire outgoing
    /// table with `entries`. The new table only takes effect once the
    /// frame itself finishes encoding.
    pub fn set_vocab(&mut self, entries: Vec<(u64, Vec<u8>)>) {
        self.vocab_queue.push_back(VocabRequest::Replace(entries));
        self.drive_encode();
    }

    /// Resume encoding after a previously suspended [`SliceStep::Await`].
    /// No slicer in this codec currently suspends, so today this only
    /// ever re-drives whatever is already queued; it exists for
    /// slicers that suspend on backpressure in the future.
    pub fn resume(&mut self, _token: AwaitToken) {
        self.drive_encode();
    }

    /// Take everything encoded so far, leaving the internal buffer
    /// empty.
    pub fn take_output(&mut self) -> Bytes {
        self.output.split().freeze()
    }

    /// Feed newly-received bytes into the decode pump.
    pub fn data_received(&mut self, chunk: impl Into<Bytes>) {
        if self.disconnect_reason.is_some() {
            return;
        }
        let _span = debug_span!("data_received").entered();
        self.recv_buf.append(chunk.into());
        if let Err(e) = self.drain_tokens() {
            self.fail_connection(e);
        }
    }

    /// Pop the next pending event, if any.
    pub fn poll_event(&mut self) -> Option<Event> {
        self.events.pop_front()
    }

    /// Record that the underlying transport is gone. No further
    /// progress is possible; `data_received`/`send` become no-ops.
    pub fn connection_lost(&mut self, reason: BananaError) {
        if self.disconnect_reason.is_none() {
            error!(error = %reason, "connection lost");
            self.disconnect_reason = Some(reason);
        }
    }

    /// The error that ended this connection, if it has.
    #[must_use]
    pub fn disconnect_reason(&self) -> Option<&BananaError> {
        self.disconnect_reason.as_ref()
    }

    /// Set the constraint top-level received values must satisfy.
    /// `None` accepts anything.
    pub fn set_constraint(&mut self, constraint: Option<Rc<dyn Constraint>>) {
        self.root_constraint = constraint;
    }

    fn fail_connection(&mut self, reason: BananaError) {
        error!(error = %reason, "connection-ending error");
        self.disconnect_reason = Some(reason);
    }

    fn drive_encode(&mut self) {
        if self.disconnect_reason.is_some() {
            return;
        }
        if let Err(e) = self.pump_encode() {
            self.fail_connection(e);
        }
    }

    // ---- encode pump ----

    fn encode_path(&self) -> String {
        format!("root[{}]", self.encode_stack.len())
    }

    fn pump_encode(&mut self) -> BananaResult<()> {
        loop {
            if self.encode_stack.is_empty() {
                if !self.start_next_top_level()? {
                    return Ok(());
                }
                continue;
            }

            let step = self.encode_stack.last_mut().expect("checked non-empty above").slicer.next_step();
            match step {
                Ok(SliceStep::Emit(atom)) => self.emit_atom(atom),
                Ok(SliceStep::Recurse(value)) => match self.push_slicer_for(value) {
                    Ok(()) => {},
                    Err(StepError::Violation(v)) => self.notify_parent_child_failed(v)?,
                    Err(StepError::Fatal(e)) => return Err(e),
                },
                Ok(SliceStep::Await(_token)) => return Ok(()),
                Ok(SliceStep::Done) => {
                    self.encode_stack.pop();
                    if self.encode_stack.is_empty() {
                        self.finish_top_level_send(SendOutcome::Sent);
                        self.apply_pending_vocab_flip();
                    }
                },
                Err(StepError::Violation(v)) => self.fail_current_frame(v)?,
                Err(StepError::Fatal(e)) => return Err(e),
            }
        }
    }

    fn start_next_top_level(&mut self) -> BananaResult<bool> {
        if let Some(request) = self.vocab_queue.pop_front() {
            let path = self.encode_path();
            let slicer: Box<dyn Slicer> = match request {
                VocabRequest::Replace(entries) => {
                    self.pending_vocab_flip = Some(PostClose::ReplaceVocab(entries.clone()));
                    Box::new(ReplaceVocabSlicer::new(path, entries))
                },
                VocabRequest::Add(index, word) => Box::new(AddVocabSlicer::new(path, index, word)),
            };
            self.encode_stack.push(EncodeFrame { slicer, origin: None, refid: None });
            return Ok(true);
        }

        let Some(value) = self.root_slicer.pop() else { return Ok(false) };
        self.current_send = self.send_handles.pop_front();
        match self.push_slicer_for(value) {
            Ok(()) => {},
            Err(StepError::Violation(v)) => self.finish_top_level_send(SendOutcome::Aborted(v)),
            Err(StepError::Fatal(e)) => return Err(e),
        }
        Ok(true)
    }

    fn push_slicer_for(&mut self, value: Value) -> crate::error::StepResult<()> {
        if let Some(limit) = self.config.max_frame_depth {
            if self.encode_stack.len() >= limit {
                return Err(BananaError::FrameDepthExceeded { limit }.into());
            }
        }
        let path = self.encode_path();
        match slicer_root::slicer_for_object(path.clone(), &value, &self.encode_refs, self.config.mode)? {
            SlicerDispatch::Slicer(slicer) => {
                self.encode_stack.push(EncodeFrame { slicer, origin: Some(value), refid: None });
            },
            SlicerDispatch::Reference(id) => {
                let slicer: Box<dyn Slicer> = Box::new(ReferenceSlicer::new(path, id));
                self.encode_stack.push(EncodeFrame { slicer, origin: None, refid: None });
            },
        }
        Ok(())
    }

    fn emit_atom(&mut self, atom: Atom) {
        match atom {
            Atom::Open(parts) => {
                let id = self.next_frame_id;
                self.next_frame_id += 1;
                encoder::encode_open(&mut self.output, id);
                for part in &parts {
                    encoder::encode_bytes(&mut self.output, &self.outgoing_vocab, part);
                }
                trace!(frame_id = id, "encoded OPEN");
                if let Some(frame) = self.encode_stack.last_mut() {
                    frame.refid = Some(id);
                    if let Some(value) = frame.origin.take() {
                        self.encode_refs.bind(&value, id);
                    }
                }
            },
            Atom::Close => {
                let id = self.encode_stack.last().and_then(|f| f.refid).unwrap_or(0);
                encoder::encode_close(&mut self.output, id);
                trace!(frame_id = id, "encoded CLOSE");
            },
            Atom::Int(n) => encode_signed_i64(&mut self.output, n),
            Atom::BigInt(n) => encode_signed_bigint(&mut self.output, &n),
            Atom::Float(f) => encoder::encode_float(&mut self.output, f),
            Atom::Bytes(b) => encoder::encode_bytes(&mut self.output, &self.outgoing_vocab, &b),
            Atom::Str(s) => encoder::encode_str(&mut self.output, &self.outgoing_vocab, &s),
            Atom::Reference(id) => encoder::encode_int(&mut self.output, &BigUint::from(id)),
        }
    }

    /// The current top frame's own `next_step` (or `receive_close`,
    /// on the decode side) failed: pop it, emit `ABORT` followed by
    /// this frame's own `CLOSE` if it had already opened, and let the
    /// new top decide whether it also fails.
    fn fail_current_frame(&mut self, violation: Violation) -> BananaResult<()> {
        warn!(%violation, "encode violation; aborting frame");
        match self.encode_stack.pop() {
            Some(frame) => {
                if let Some(id) = frame.refid {
                    encoder::encode_abort(&mut self.output);
                    encoder::encode_close(&mut self.output, id);
                }
                self.notify_parent_child_failed(violation)
            },
            None => {
                self.finish_top_level_send(SendOutcome::Aborted(violation));
                Ok(())
            },
        }
    }

    /// A child this slicer tried to recurse into never got as far as
    /// opening a frame (it failed before that). Nothing to abort on the
    /// wire for the child itself; just ask the parent whether it wants
    /// to absorb the failure or fail in turn.
    fn notify_parent_child_failed(&mut self, violation: Violation) -> BananaResult<()> {
        match self.encode_stack.last_mut() {
            Some(parent) => match parent.slicer.child_aborted(violation) {
                Some(v) => self.fail_current_frame(v),
                None => Ok(()),
            },
            None => {
                self.finish_top_level_send(SendOutcome::Aborted(violation));
                Ok(())
            },
        }
    }

    fn finish_top_level_send(&mut self, outcome: SendOutcome) {
        if let Some(handle) = self.current_send.take() {
            self.events.push_back(Event::Sent(handle, outcome));
        }
    }

    fn apply_pending_vocab_flip(&mut self) {
        if let Some(PostClose::ReplaceVocab(entries)) = self.pending_vocab_flip.take() {
            debug!(count = entries.len(), "replacing outgoing vocab table");
            self.outgoing_vocab.replace(entries.into_iter().collect());
        }
    }

    // ---- decode pump ----

    fn decode_path(&self) -> String {
        format!("root[{}]", self.decode_stack.len())
    }

    fn active_constraint(&self) -> Option<Rc<dyn Constraint>> {
        match self.decode_stack.last() {
            Some(frame) => frame.child_constraint.clone(),
            None => self.root_constraint.clone(),
        }
    }

    fn drain_tokens(&mut self) -> BananaResult<()> {
        loop {
            let Some(token) = self.decoder.decode_next(&mut self.recv_buf, &self.incoming_vocab)? else {
                return Ok(());
            };
            trace!(?token, "decoded token");
            self.handle_token(token)?;
        }
    }

    fn handle_token(&mut self, token: Token) -> BananaResult<()> {
        if let Some(id) = self.awaiting_opentype.take() {
            return self.finalize_open(id, token);
        }
        if let Some(state) = self.discard.take() {
            return self.handle_token_while_discarding(state, token);
        }
        match token {
            Token::Open(id) => self.handle_open(id),
            Token::Close(id) => self.handle_close(id),
            Token::Abort => self.handle_abort(),
            Token::Error(message) => Err(BananaError::PeerError(message)),
            Token::Int(n) => self.deliver_value(biguint_to_value(n, false)),
            Token::Neg(n) => self.deliver_value(biguint_to_value(n, true)),
            Token::Float(f) => self.deliver_value(Value::Float(f)),
            Token::Bytes(b) => self.deliver_value(Value::Bytes(b)),
            Token::Str(s) => self.deliver_value(Value::Str(s)),
        }
    }

    fn handle_token_while_discarding(&mut self, mut state: DiscardState, token: Token) -> BananaResult<()> {
        match token {
            Token::Open(_) => {
                state.depth += 1;
                self.discard = Some(state);
            },
            Token::Close(_) => {
                if state.depth > 0 {
                    state.depth -= 1;
                    self.discard = Some(state);
                } else if state.frames_remaining > 0 {
                    state.frames_remaining -= 1;
                    state.depth = 0;
                    self.discard = Some(state);
                }
                // else: the discarded region's last CLOSE just arrived;
                // `self.discard` stays cleared (already taken above).
            },
            Token::Error(message) => return Err(BananaError::PeerError(message)),
            _ => self.discard = Some(state),
        }
        Ok(())
    }

    fn handle_open(&mut self, id: u64) -> BananaResult<()> {
        if let Some(limit) = self.config.max_frame_depth {
            if self.decode_stack.len() >= limit {
                return Err(BananaError::FrameDepthExceeded { limit });
            }
        }
        self.decode_refs.borrow_mut().open(id);
        self.awaiting_opentype = Some(id);
        Ok(())
    }

    fn finalize_open(&mut self, id: u64, token: Token) -> BananaResult<()> {
        let kind = match token {
            Token::Bytes(b) => b,
            Token::Str(s) => s.into_bytes(),
            _ => {
                return Err(BananaError::StructuralTypeMismatch {
                    path: self.decode_path(),
                    expected: "opentype name (BYTES or STRING)",
                });
            },
        };

        let path = self.decode_path();
        let active = self.active_constraint();

        if let Some(constraint) = &active {
            if let Err(violation) = constraint.check_opentype(&path, &kind) {
                self.fail_frame_id(id);
                return self.propagate_violation(violation, 1);
            }
        }

        let max_length = active.as_ref().and_then(|c| c.max_length());

        let unslicer = if kind.as_slice() == opentype::SET_VOCAB {
            DecodeUnslicer::ReplaceVocab(ReplaceVocabUnslicer::new(path.clone()))
        } else if kind.as_slice() == opentype::ADD_VOCAB {
            DecodeUnslicer::AddVocab(AddVocabUnslicer::new(path.clone()))
        } else {
            let opentype = opentype::single(&kind);
            let ctx = UnslicerContext {
                references: self.decode_refs.clone(),
                class_registry: self.class_registry.clone(),
                mode: self.config.mode,
            };
            match dispatch_open(path.clone(), &opentype, &ctx, max_length) {
                Ok(u) => DecodeUnslicer::Generic(u),
                Err(StepError::Violation(v)) => {
                    self.fail_frame_id(id);
                    return self.propagate_violation(v, 1);
                },
                Err(StepError::Fatal(e)) => return Err(e),
            }
        };

        let child_constraint = active.and_then(|c| c.element_constraint());
        self.decode_stack.push(DecodeFrame { unslicer, refid: id, child_constraint });
        Ok(())
    }

    fn handle_close(&mut self, id: u64) -> BananaResult<()> {
        let Some(top) = self.decode_stack.last() else {
            return Err(BananaError::TopLevelClose);
        };
        if top.refid != id {
            return Err(BananaError::UnmatchedClose { expected: Some(top.refid), got: id });
        }
        let mut frame = self.decode_stack.pop().expect("checked above");
        let refid = frame.refid;
        match frame.unslicer.receive_close() {
            Ok(value) => {
                self.decode_refs.borrow_mut().close(refid, value.clone());
                self.apply_vocab_effect(frame.unslicer);
                self.deliver_value(value)
            },
            Err(StepError::Violation(v)) => {
                self.fail_frame_id(refid);
                self.propagate_violation(v, 0)
            },
            Err(StepError::Fatal(e)) => Err(e),
        }
    }

    fn handle_abort(&mut self) -> BananaResult<()> {
        let Some(frame) = self.decode_stack.pop() else {
            return Err(BananaError::UnexpectedAbort);
        };
        let violation = Violation::AbortReceived { path: frame.unslicer.path().to_string() };
        self.fail_frame_id(frame.refid);
        // The aborted frame's own CLOSE is still outstanding on the wire;
        // discard through it rather than treating it as a new, unmatched
        // CLOSE.
        self.propagate_violation(violation, 1)
    }

    fn apply_vocab_effect(&mut self, unslicer: DecodeUnslicer) {
        match unslicer {
            DecodeUnslicer::ReplaceVocab(u) => {
                let table = u.into_table();
                debug!(count = table.len(), "replacing incoming vocab table");
                self.incoming_vocab.replace(table);
            },
            DecodeUnslicer::AddVocab(u) => {
                if let Some((index, word)) = u.into_entry() {
                    debug!(index, "adding incoming vocab entry");
                    self.incoming_vocab.add(index, word);
                }
            },
            DecodeUnslicer::Generic(_) => {},
        }
    }

    /// Deliver a freshly-assembled value (a scalar token, or a frame
    /// that just closed) to whatever is waiting for it: the current top
    /// decode frame's `receive_child`, or — if nothing is open — this
    /// connection's top-level received-value queue.
    fn deliver_value(&mut self, value: Value) -> BananaResult<()> {
        let path = self.decode_path();
        if let Some(constraint) = self.active_constraint() {
            if let Err(violation) = constraint.check_value(&path, &value) {
                return self.propagate_violation(violation, 0);
            }
        }

        let unresolved_target = match &value {
            Value::Unresolved(id) => Some(*id),
            _ => None,
        };

        if self.decode_stack.is_empty() {
            self.events.push_back(Event::Received(value));
            return Ok(());
        }

        let outcome = self.decode_stack.last_mut().expect("checked non-empty above").unslicer.receive_child(value);
        match outcome {
            Ok(()) => {
                if let Some(target) = unresolved_target {
                    if let Some(site) = self.decode_stack.last().and_then(|f| f.unslicer.last_child_site()) {
                        self.decode_refs.borrow_mut().register_patch(target, site);
                    }
                }
                Ok(())
            },
            Err(StepError::Violation(v)) => {
                let failed = self.decode_stack.pop().expect("checked non-empty above");
                self.fail_frame_id(failed.refid);
                self.propagate_violation(v, 1)
            },
            Err(StepError::Fatal(e)) => Err(e),
        }
    }

    /// Resolve a doomed frame's reference id to `None` rather than
    /// leaving it pending forever: any forward reference already
    /// pointing at it resolves to `None` once this runs.
    fn fail_frame_id(&mut self, id: u64) {
        self.decode_refs.borrow_mut().close(id, Value::None);
    }

    /// Walk `violation` up through `report_violation` on each enclosing
    /// frame, popping every frame that also decides to fail, then mark
    /// the token stream to discard through however many of their
    /// `CLOSE`s are still outstanding.
    fn propagate_violation(&mut self, violation: Violation, pending_closes: usize) -> BananaResult<()> {
        warn!(%violation, "violation reported");
        let mut pending = pending_closes;
        let mut current = violation;
        loop {
            if self.decode_stack.is_empty() {
                self.events.push_back(Event::ViolationReported(current));
                break;
            }
            let verdict =
                self.decode_stack.last_mut().expect("checked non-empty above").unslicer.report_violation(current);
            match verdict {
                Some(next) => {
                    let failed = self.decode_stack.pop().expect("checked non-empty above");
                    self.fail_frame_id(failed.refid);
                    pending += 1;
                    current = next;
                },
                None => break,
            }
        }
        if pending > 0 {
            self.discard = Some(DiscardState { depth: 0, frames_remaining: pending - 1 });
        }
        Ok(())
    }
}

fn encode_signed_i64(sink: &mut BytesMut, value: i64) {
    if value >= 0 {
        encoder::encode_int(sink, &BigUint::from(value as u64));
    } else {
        encoder::encode_neg(sink, &BigUint::from(value.unsigned_abs()));
    }
}

fn encode_signed_bigint(sink: &mut BytesMut, value: &BigInt) {
    if value.sign() == Sign::Minus {
        encoder::encode_neg(sink, value.magnitude());
    } else {
        encoder::encode_int(sink, value.magnitude());
    }
}

fn biguint_to_value(magnitude: BigUint, negative: bool) -> Value {
    let signed = if negative { -BigInt::from(magnitude) } else { BigInt::from(magnitude) };
    match signed.to_i64() {
        Some(n) => Value::Int(n),
        None => Value::BigInt(signed),
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::value::SeqKind;

    fn pair() -> (Banana, Banana) {
        (Banana::new(BananaConfig::default(), ClassRegistry::new()), Banana::new(BananaConfig::default(), ClassRegistry::new()))
    }

    fn deliver(sender: &mut Banana, receiver: &mut Banana) {
        let bytes = sender.take_output();
        receiver.data_received(bytes);
    }

    #[test]
    fn round_trips_a_simple_list() {
        let (mut sender, mut receiver) = pair();
        let handle = sender.send(Value::list(vec![Value::Int(1), Value::Int(2)]));
        deliver(&mut sender, &mut receiver);

        assert_eq!(sender.poll_event(), Some(Event::Sent(handle, SendOutcome::Sent)));
        assert_eq!(receiver.poll_event(), Some(Event::Received(Value::list(vec![Value::Int(1), Value::Int(2)]))));
        assert!(receiver.disconnect_reason().is_none());
    }

    #[test]
    fn round_trips_a_bigint_and_a_negative_int() {
        let (mut sender, mut receiver) = pair();
        let huge = BigInt::from(1i64) << 100;
        sender.send(Value::list(vec![Value::BigInt(huge.clone()), Value::Int(-7)]));
        deliver(&mut sender, &mut receiver);

        let Some(Event::Received(Value::Seq(SeqKind::List, items))) = receiver.poll_event() else {
            panic!("expected a received list");
        };
        assert_eq!(items.borrow()[0], Value::BigInt(huge));
        assert_eq!(items.borrow()[1], Value::Int(-7));
    }

    #[test]
    fn round_trips_a_mixed_bag_of_scalars() {
        // x = [Decimal("0.000003"), True, None, frozenset([1, 2]), 2**100]
        let (mut sender, mut receiver) = pair();
        let huge = BigInt::from(1i64) << 100;
        let frozen = Value::FrozenSet(Rc::new(RefCell::new(vec![Value::Int(1), Value::Int(2)])));
        let original = Value::list(vec![
            Value::Decimal(crate::value::BananaDecimal::parse("0.000003").unwrap()),
            Value::Bool(true),
            Value::None,
            frozen,
            Value::BigInt(huge),
        ]);
        sender.send(original.clone());
        deliver(&mut sender, &mut receiver);

        assert_eq!(receiver.poll_event(), Some(Event::Received(original)));
        assert!(receiver.disconnect_reason().is_none());
    }

    #[test]
    fn round_trips_a_cyclic_list() {
        let (mut sender, mut receiver) = pair();
        let backing = Rc::new(RefCell::new(vec![Value::Int(0)]));
        let cyclic = Value::Seq(SeqKind::List, backing.clone());
        backing.borrow_mut()[0] = cyclic.clone();

        sender.send(cyclic);
        deliver(&mut sender, &mut receiver);

        let Some(Event::Received(Value::Seq(SeqKind::List, decoded))) = receiver.poll_event() else {
            panic!("expected a received list");
        };
        let Value::Seq(SeqKind::List, first) = &decoded.borrow()[0] else {
            panic!("expected the cycle to resolve to a list");
        };
        assert!(Rc::ptr_eq(&decoded, first));
    }

    #[test]
    fn abort_reports_a_violation_and_keeps_the_connection_alive() {
        let mut receiver = Banana::new(BananaConfig::default(), ClassRegistry::new());
        let mut wire = BytesMut::new();
        encoder::encode_open(&mut wire, 0);
        encoder::encode_bytes(&mut wire, &OutgoingVocab::from_initial(VocabTableIndex::V1), opentype::LIST);
        encoder::encode_abort(&mut wire);
        encoder::encode_close(&mut wire, 0);

        receiver.data_received(wire.freeze());

        match receiver.poll_event() {
            Some(Event::ViolationReported(Violation::AbortReceived { .. })) => {},
            other => panic!("expected an AbortReceived violation, got {other:?}"),
        }
        assert!(receiver.disconnect_reason().is_none());
    }

    #[test]
    fn encoding_an_aborted_frame_emits_a_paired_close() {
        // An aborted frame's ABORT is always followed by that same
        // frame's own CLOSE, never left dangling. A list holding a
        // safe-mode-illegal element (an `Instance`) opens its own frame
        // before the element fails to serialize, so `fail_current_frame`
        // pops the list with `refid` already set and must pair the
        // ABORT with a CLOSE.
        let (mut sender, mut receiver) = pair();
        let instance = crate::value::Instance {
            protocol: crate::value::ReduceProtocol::Two,
            class_name: "demo.Widget".to_string(),
            args: Rc::new(RefCell::new(Vec::new())),
            kwargs: None,
            state: Rc::new(RefCell::new(Vec::new())),
            list_items: Rc::new(RefCell::new(Vec::new())),
            dict_items: Rc::new(RefCell::new(Vec::new())),
        };
        let handle = sender.send(Value::list(vec![Value::Instance(Rc::new(instance))]));
        let wire = sender.take_output();

        let mut expected = BytesMut::new();
        encoder::encode_open(&mut expected, 0);
        encoder::encode_bytes(&mut expected, &OutgoingVocab::from_initial(VocabTableIndex::V1), opentype::LIST);
        encoder::encode_abort(&mut expected);
        encoder::encode_close(&mut expected, 0);
        assert_eq!(wire, expected.freeze());

        assert!(matches!(sender.poll_event(), Some(Event::Sent(h, SendOutcome::Aborted(_))) if h == handle));

        receiver.data_received(wire);
        match receiver.poll_event() {
            Some(Event::ViolationReported(Violation::AbortReceived { .. })) => {},
            other => panic!("expected an AbortReceived violation, got {other:?}"),
        }
        assert!(receiver.disconnect_reason().is_none());
    }

    #[test]
    fn prefix_limit_exceeded_is_fatal() {
        let config = BananaConfig { prefix_limit: 4, ..BananaConfig::default() };
        let mut receiver = Banana::new(config, ClassRegistry::new());
        let mut garbage = vec![0u8; 8];
        garbage.push(banana_wire::token::TYPE_INT);

        receiver.data_received(garbage);

        assert!(receiver.disconnect_reason().is_some());
    }

    #[test]
    fn unregistered_instance_opentype_is_discarded_in_safe_mode() {
        let (mut sender, mut receiver) = pair();
        sender.send(Value::list(vec![Value::Int(1)]));
        let good = sender.take_output();

        let mut wire = BytesMut::new();
        encoder::encode_open(&mut wire, 99);
        let vocab = OutgoingVocab::from_initial(VocabTableIndex::V1);
        encoder::encode_bytes(&mut wire, &vocab, opentype::INSTANCE);
        encoder::encode_str(&mut wire, &vocab, "demo.Widget");
        encoder::encode_close(&mut wire, 99);

        receiver.data_received(wire.freeze());
        match receiver.poll_event() {
            Some(Event::ViolationReported(Violation::SchemaMismatch { .. })) => {},
            other => panic!("expected a schema-mismatch violation, got {other:?}"),
        }
        assert!(receiver.disconnect_reason().is_none());

        receiver.data_received(good);
        assert_eq!(receiver.poll_event(), Some(Event::Received(Value::list(vec![Value::Int(1)]))));
    }
}
