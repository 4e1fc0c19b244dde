//! Schema language parsing.
//!
//! [`Loader`] accumulates one or more source files into a single
//! [`Config`]: `parse_str`/`parse_file` run the tokenizer and the
//! statement grammar, and [`Loader::link`] resolves every cross-entity
//! reference (enum bindings, foreign keys, dotted query chains, role
//! maps) and hands back the finished model. Diagnostics carry positions
//! and accumulate on the configuration's message queue.

mod lex;
mod link;

use crate::error::{Error, Result};
use crate::model::{
    Action, Aggr, AggrOp, BitIndex, Bitf, BitfId, Config, Distinct, EnmId, Enum, EnumItem, Field,
    FieldId, FieldType, Group, Insert, Label, ModType, Op, Ord, OrdDir, QueryKind, Role, RoleId,
    RoleMapKind, Search, Sent, Strct, StrctId, Unique, Update, UpdateKind, Uref, Valid, ValidOp,
    ValidValue,
};
use crate::msg::{Msg, MsgKind, MsgQueue, Pos};
use lex::{lex, TokKind, Token};
use std::fs;
use std::path::Path;
use thiserror::Error as ThisError;
use tracing::debug;

/// A failed load: the summary error plus every diagnostic gathered
/// before the failure.
#[derive(Debug, ThisError)]
#[error("{error}")]
pub struct LoadError {
    pub msgs: MsgQueue,
    pub error: Error,
}

/// Incremental parser over one or more schema files.
#[derive(Debug)]
pub struct Loader {
    cfg: Config,
    pending: Pending,
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

impl Loader {
    pub fn new() -> Self {
        Self {
            cfg: Config::new(),
            pending: Pending::default(),
        }
    }

    /// The configuration parsed so far, including its diagnostics.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Parse one schema file and fold it into the configuration.
    pub fn parse_file(&mut self, path: &Path) -> Result<()> {
        let src = fs::read_to_string(path)?;
        self.parse_str(&src, &path.display().to_string())
    }

    /// Parse schema source text under the given file name.
    pub fn parse_str(&mut self, src: &str, file: &str) -> Result<()> {
        self.cfg.fnames.push(file.to_string());

        let toks = match lex(src, file) {
            Ok(toks) => toks,
            Err((pos, msg)) => {
                self.cfg
                    .msgs
                    .push(Msg::new(Some(pos), MsgKind::Error, msg.clone()));
                return Err(Error::Syntax(msg));
            }
        };

        let mut p = Parser {
            toks: &toks,
            i: 0,
            file,
            cfg: &mut self.cfg,
            pending: &mut self.pending,
        };
        match p.parse_config() {
            Ok(()) => {
                debug!(file, "parsed schema source");
                Ok(())
            }
            Err(e) => {
                self.cfg
                    .msgs
                    .push(Msg::new(Some(e.pos), MsgKind::Error, e.msg.clone()));
                Err(Error::Syntax(e.msg))
            }
        }
    }

    /// Resolve all deferred references and return the finished model.
    pub fn link(mut self) -> std::result::Result<Config, LoadError> {
        let pending = std::mem::take(&mut self.pending);
        if link::link(&mut self.cfg, pending) {
            debug!(
                strcts = self.cfg.strcts.len(),
                enums = self.cfg.enums.len(),
                bitfs = self.cfg.bitfs.len(),
                roles = self.cfg.roles.len(),
                "linked configuration"
            );
            Ok(self.cfg)
        } else {
            Err(LoadError {
                msgs: self.cfg.msgs,
                error: Error::Link("schema failed to link".into()),
            })
        }
    }
}

/// Parse and link a single source string in one step.
pub fn load_str(src: &str, file: &str) -> std::result::Result<Config, LoadError> {
    let mut loader = Loader::new();
    if let Err(error) = loader.parse_str(src, file) {
        return Err(LoadError {
            msgs: loader.cfg.msgs,
            error,
        });
    }
    loader.link()
}

// ============================================================================
// Deferred resolution requests
// ============================================================================

#[derive(Debug, Default)]
pub(crate) struct Pending {
    pub field_refs: Vec<FieldRefReq>,
    pub struct_sources: Vec<StructSourceReq>,
    pub enum_binds: Vec<BindReq>,
    pub bitf_binds: Vec<BindReq>,
    pub enum_defaults: Vec<BindReq>,
    pub rolemaps: Vec<RolemapReq>,
}

#[derive(Debug)]
pub(crate) struct FieldRefReq {
    pub field: FieldId,
    pub strct: String,
    pub target: String,
    pub pos: Pos,
}

#[derive(Debug)]
pub(crate) struct StructSourceReq {
    pub field: FieldId,
    pub source: String,
    pub pos: Pos,
}

#[derive(Debug)]
pub(crate) struct BindReq {
    pub field: FieldId,
    pub name: String,
    pub pos: Pos,
}

#[derive(Debug)]
pub(crate) struct RolemapReq {
    pub strct: StrctId,
    pub kind: RoleMapKind,
    pub roles: Vec<String>,
    pub target: Option<String>,
    pub pos: Pos,
}

// ============================================================================
// Recursive descent over the token stream
// ============================================================================

struct PErr {
    pos: Pos,
    msg: String,
}

type PResult<T> = std::result::Result<T, PErr>;

/// Raw default literal, coerced once the field type is known.
enum RawDef {
    Int(i64),
    Dec(f64),
    Str(String),
    Item(String),
}

struct Parser<'a> {
    toks: &'a [Token],
    i: usize,
    file: &'a str,
    cfg: &'a mut Config,
    pending: &'a mut Pending,
}

impl<'a> Parser<'a> {
    fn eof_pos(&self) -> Pos {
        self.toks
            .last()
            .map(|t| t.pos.clone())
            .unwrap_or_else(|| Pos::new(self.file, 1, 1))
    }

    fn cur(&self) -> Option<&Token> {
        self.toks.get(self.i)
    }

    fn cur_pos(&self) -> Pos {
        self.cur().map(|t| t.pos.clone()).unwrap_or_else(|| self.eof_pos())
    }

    fn err<T>(&self, pos: Pos, msg: impl Into<String>) -> PResult<T> {
        Err(PErr {
            pos,
            msg: msg.into(),
        })
    }

    fn expect_punct(&mut self, kind: TokKind, what: &str) -> PResult<Pos> {
        match self.cur() {
            Some(t) if t.kind == kind => {
                let pos = t.pos.clone();
                self.i += 1;
                Ok(pos)
            }
            Some(t) => {
                let (pos, found) = (t.pos.clone(), t.kind.describe());
                self.err(pos, format!("expected {}, found {}", what, found))
            }
            None => self.err(self.eof_pos(), format!("expected {}, found end of input", what)),
        }
    }

    fn expect_semi(&mut self) -> PResult<()> {
        self.expect_punct(TokKind::Semi, "`;`").map(|_| ())
    }

    fn expect_ident(&mut self, what: &str) -> PResult<(String, Pos)> {
        match self.cur() {
            Some(Token {
                kind: TokKind::Ident(s),
                pos,
            }) => {
                let out = (s.clone(), pos.clone());
                self.i += 1;
                Ok(out)
            }
            Some(t) => {
                let (pos, found) = (t.pos.clone(), t.kind.describe());
                self.err(pos, format!("expected {}, found {}", what, found))
            }
            None => self.err(self.eof_pos(), format!("expected {}, found end of input", what)),
        }
    }

    fn expect_str(&mut self, what: &str) -> PResult<String> {
        match self.cur() {
            Some(Token {
                kind: TokKind::Str(s),
                ..
            }) => {
                let s = s.clone();
                self.i += 1;
                Ok(s)
            }
            _ => {
                let pos = self.cur_pos();
                self.err(pos, format!("expected {}", what))
            }
        }
    }

    fn expect_int(&mut self, what: &str) -> PResult<i64> {
        match self.cur() {
            Some(Token {
                kind: TokKind::Integer(v),
                ..
            }) => {
                let v = *v;
                self.i += 1;
                Ok(v)
            }
            _ => {
                let pos = self.cur_pos();
                self.err(pos, format!("expected {}", what))
            }
        }
    }

    fn eat_punct(&mut self, kind: TokKind) -> bool {
        if matches!(self.cur(), Some(t) if t.kind == kind) {
            self.i += 1;
            true
        } else {
            false
        }
    }

    fn peek_ident(&self) -> Option<&str> {
        match self.cur() {
            Some(Token {
                kind: TokKind::Ident(s),
                ..
            }) => Some(s),
            _ => None,
        }
    }

    fn eat_kw(&mut self, kw: &str) -> bool {
        if self.peek_ident() == Some(kw) {
            self.i += 1;
            true
        } else {
            false
        }
    }

    /// A dotted identifier chain, returned in canonical `a.b.c` form.
    fn parse_path(&mut self, what: &str) -> PResult<(String, Pos)> {
        let (first, pos) = self.expect_ident(what)?;
        let mut path = first;
        while self.eat_punct(TokKind::Dot) {
            let (next, _) = self.expect_ident("path component")?;
            path.push('.');
            path.push_str(&next);
        }
        Ok((path, pos))
    }

    // ------------------------------------------------------------------------
    // Top level
    // ------------------------------------------------------------------------

    fn parse_config(&mut self) -> PResult<()> {
        while self.cur().is_some() {
            let (kw, pos) = self.expect_ident("top-level keyword")?;
            match kw.as_str() {
                "struct" => self.parse_strct()?,
                "enum" => self.parse_enum()?,
                "bits" | "bitfield" => self.parse_bitf()?,
                "roles" => self.parse_roles_block(pos)?,
                _ => return self.err(pos, format!("unknown top-level keyword `{}`", kw)),
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Structures
    // ------------------------------------------------------------------------

    fn parse_strct(&mut self) -> PResult<()> {
        let (name, pos) = self.expect_ident("structure name")?;
        if self.cfg.find_strct(&name).is_some() {
            return self.err(pos, format!("duplicate structure `{}`", name));
        }

        let id = StrctId(self.cfg.strcts.len());
        self.cfg.strcts.push(Strct {
            id,
            name,
            doc: None,
            fields: Vec::new(),
            searches: Vec::new(),
            updates: Vec::new(),
            deletes: Vec::new(),
            insert: None,
            uniques: Vec::new(),
            noexports: Vec::new(),
            pos: pos.clone(),
        });

        self.expect_punct(TokKind::LBrace, "`{`")?;
        while !self.eat_punct(TokKind::RBrace) {
            let (kw, kwpos) = self.expect_ident("structure item")?;
            match kw.as_str() {
                "field" => self.parse_field(id)?,
                "comment" => {
                    let doc = self.expect_str("comment text")?;
                    self.expect_semi()?;
                    self.cfg.strcts[id.0].doc = Some(doc);
                }
                "count" => self.parse_query(id, QueryKind::Count, kwpos)?,
                "search" => self.parse_query(id, QueryKind::Search, kwpos)?,
                "list" => self.parse_query(id, QueryKind::List, kwpos)?,
                "iterate" => self.parse_query(id, QueryKind::Iterate, kwpos)?,
                "update" => self.parse_update(id, UpdateKind::Modify, kwpos)?,
                "delete" => self.parse_update(id, UpdateKind::Delete, kwpos)?,
                "insert" => {
                    self.expect_semi()?;
                    if self.cfg.strcts[id.0].insert.is_some() {
                        return self.err(kwpos, "duplicate insert");
                    }
                    self.cfg.strcts[id.0].insert = Some(Insert {
                        rolemap: None,
                        parent: id,
                        pos: kwpos,
                    });
                }
                "unique" => self.parse_unique(id, kwpos)?,
                "roles" => self.parse_rolemap(id)?,
                _ => return self.err(kwpos, format!("unknown structure item `{}`", kw)),
            }
        }
        self.expect_semi()?;

        if self.cfg.strcts[id.0].fields.is_empty() {
            let pos = self.cfg.strcts[id.0].pos.clone();
            return self.err(pos, "structure has no fields");
        }
        Ok(())
    }

    fn parse_field(&mut self, strct: StrctId) -> PResult<()> {
        let (name, pos) = self.expect_ident("field name")?;
        if self.cfg.strcts[strct.0].field_named(&name).is_some() {
            return self.err(pos, format!("duplicate field `{}`", name));
        }

        let mut target: Option<(String, String)> = None;
        if self.eat_punct(TokKind::Colon) {
            let (ts, _) = self.expect_ident("reference structure")?;
            self.expect_punct(TokKind::Dot, "`.`")?;
            let (tf, _) = self.expect_ident("reference field")?;
            target = Some((ts, tf));
        }

        let mut ftype = FieldType::Int;
        let mut enum_bind: Option<String> = None;
        let mut bitf_bind: Option<String> = None;
        let mut struct_source: Option<String> = None;
        if let Some(t) = self.peek_ident() {
            let known = match t {
                "bit" => Some(FieldType::Bit),
                "date" => Some(FieldType::Date),
                "epoch" => Some(FieldType::Epoch),
                "int" => Some(FieldType::Int),
                "real" => Some(FieldType::Real),
                "blob" => Some(FieldType::Blob),
                "text" => Some(FieldType::Text),
                "password" => Some(FieldType::Password),
                "email" => Some(FieldType::Email),
                "enum" => Some(FieldType::Enum),
                "bits" => Some(FieldType::Bitfield),
                "struct" => Some(FieldType::Struct),
                _ => None,
            };
            if let Some(ft) = known {
                self.i += 1;
                ftype = ft;
                match ft {
                    FieldType::Enum => enum_bind = Some(self.expect_ident("enum name")?.0),
                    FieldType::Bitfield => bitf_bind = Some(self.expect_ident("bitfield name")?.0),
                    FieldType::Struct => {
                        struct_source = Some(self.expect_ident("source field")?.0)
                    }
                    _ => {}
                }
            }
        }

        let mut field = Field {
            name,
            doc: None,
            ftype,
            rowid: false,
            unique: false,
            nullable: false,
            noexport: false,
            def: None,
            enm: None,
            bitf: None,
            reference: None,
            actdel: Action::None,
            actup: Action::None,
            rolemap: None,
            valids: Vec::new(),
            parent: strct,
            pos: pos.clone(),
        };
        let mut raw_def: Option<(RawDef, Pos)> = None;
        let mut raw_valids: Vec<(ValidOp, RawDef, Pos)> = Vec::new();

        while !self.eat_punct(TokKind::Semi) {
            let (kw, kwpos) = self.expect_ident("field attribute")?;
            match kw.as_str() {
                "rowid" => field.rowid = true,
                "unique" => field.unique = true,
                "null" => field.nullable = true,
                "noexport" => field.noexport = true,
                "comment" => field.doc = Some(self.expect_str("comment text")?),
                "actup" => field.actup = self.parse_action()?,
                "actdel" => field.actdel = self.parse_action()?,
                "default" => {
                    raw_def = Some((self.parse_raw_literal("default value")?, kwpos));
                }
                "limit" => {
                    let (vk, vkpos) = self.expect_ident("validation operator")?;
                    let op = match vk.as_str() {
                        "ge" => ValidOp::Ge,
                        "le" => ValidOp::Le,
                        "gt" => ValidOp::Gt,
                        "lt" => ValidOp::Lt,
                        "eq" => ValidOp::Eq,
                        _ => {
                            return self
                                .err(vkpos, format!("unknown validation operator `{}`", vk))
                        }
                    };
                    let raw = self.parse_raw_literal("validation value")?;
                    raw_valids.push((op, raw, kwpos));
                }
                _ => return self.err(kwpos, format!("unknown field attribute `{}`", kw)),
            }
        }

        if field.rowid && field.nullable {
            return self.err(pos, "rowid field cannot be null");
        }
        if field.rowid && self.cfg.strcts[strct.0].rowid().is_some() {
            return self.err(pos, "duplicate rowid field");
        }
        if field.ftype == FieldType::Struct && (field.rowid || field.unique || target.is_some()) {
            return self.err(pos, "invalid attribute on struct field");
        }

        let mut pending_item_def: Option<(String, Pos)> = None;
        if let Some((raw, dpos)) = raw_def {
            field.def = Some(match (field.ftype, raw) {
                (ft, RawDef::Int(v)) if ft.is_integral() => crate::model::DefaultValue::Integer(v),
                (FieldType::Real, RawDef::Int(v)) => crate::model::DefaultValue::Decimal(v as f64),
                (FieldType::Real, RawDef::Dec(v)) => crate::model::DefaultValue::Decimal(v),
                (FieldType::Text | FieldType::Email, RawDef::Str(s)) => {
                    crate::model::DefaultValue::String(s)
                }
                (FieldType::Enum, RawDef::Item(item)) => {
                    // Resolved against the bound enum at link time.
                    pending_item_def = Some((item, dpos.clone()));
                    crate::model::DefaultValue::Integer(0)
                }
                _ => return self.err(dpos, "default value does not match field type"),
            });
        }

        for (op, raw, vpos) in raw_valids {
            let value = match (field.ftype, raw) {
                (ft, RawDef::Int(v)) if ft.is_integral() => ValidValue::Integer(v),
                (FieldType::Real, RawDef::Int(v)) => ValidValue::Decimal(v as f64),
                (FieldType::Real, RawDef::Dec(v)) => ValidValue::Decimal(v),
                (ft, RawDef::Int(v)) if ft.is_sized() && v >= 0 => ValidValue::Length(v as usize),
                _ => return self.err(vpos, "validation does not match field type"),
            };
            field.valids.push(Valid { op, value });
        }

        let fid = FieldId {
            strct,
            field: self.cfg.strcts[strct.0].fields.len(),
        };
        self.cfg.strcts[strct.0].fields.push(field);

        if let Some((ts, tf)) = target {
            self.pending.field_refs.push(FieldRefReq {
                field: fid,
                strct: ts,
                target: tf,
                pos: pos.clone(),
            });
        }
        if let Some(source) = struct_source {
            self.pending.struct_sources.push(StructSourceReq {
                field: fid,
                source,
                pos: pos.clone(),
            });
        }
        if let Some(name) = enum_bind {
            self.pending.enum_binds.push(BindReq {
                field: fid,
                name,
                pos: pos.clone(),
            });
        }
        if let Some(name) = bitf_bind {
            self.pending.bitf_binds.push(BindReq {
                field: fid,
                name,
                pos: pos.clone(),
            });
        }
        if let Some((item, dpos)) = pending_item_def {
            self.pending.enum_defaults.push(BindReq {
                field: fid,
                name: item,
                pos: dpos,
            });
        }
        Ok(())
    }

    fn parse_action(&mut self) -> PResult<Action> {
        let (name, pos) = self.expect_ident("action")?;
        match name.as_str() {
            "none" => Ok(Action::None),
            "restrict" => Ok(Action::Restrict),
            "nullify" => Ok(Action::Nullify),
            "cascade" => Ok(Action::Cascade),
            "default" => Ok(Action::Default),
            _ => self.err(pos, format!("unknown action `{}`", name)),
        }
    }

    fn parse_raw_literal(&mut self, what: &str) -> PResult<RawDef> {
        match self.cur() {
            Some(Token {
                kind: TokKind::Integer(v),
                ..
            }) => {
                let v = *v;
                self.i += 1;
                Ok(RawDef::Int(v))
            }
            Some(Token {
                kind: TokKind::Decimal(v),
                ..
            }) => {
                let v = *v;
                self.i += 1;
                Ok(RawDef::Dec(v))
            }
            Some(Token {
                kind: TokKind::Str(s),
                ..
            }) => {
                let s = s.clone();
                self.i += 1;
                Ok(RawDef::Str(s))
            }
            Some(Token {
                kind: TokKind::Ident(s),
                ..
            }) => {
                let s = s.clone();
                self.i += 1;
                Ok(RawDef::Item(s))
            }
            _ => {
                let pos = self.cur_pos();
                self.err(pos, format!("expected {}", what))
            }
        }
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    fn parse_query(&mut self, strct: StrctId, kind: QueryKind, pos: Pos) -> PResult<()> {
        let mut search = Search {
            kind,
            sents: Vec::new(),
            ords: Vec::new(),
            aggr: None,
            group: None,
            distinct: None,
            name: None,
            doc: None,
            limit: 0,
            offset: 0,
            rolemap: None,
            parent: strct,
            pos,
        };

        while self.peek_ident().is_some() {
            let (fname, tpos) = self.parse_path("search term")?;
            let op = match self.peek_ident().and_then(op_from_name) {
                Some(op) => {
                    self.i += 1;
                    op
                }
                None => Op::Eq,
            };
            search.sents.push(Sent {
                fname,
                op,
                field: FieldId { strct, field: 0 },
                pos: tpos,
            });
            if !self.eat_punct(TokKind::Comma) {
                break;
            }
        }

        if self.eat_punct(TokKind::Colon) {
            while self.peek_ident().is_some() {
                let (kw, kwpos) = self.expect_ident("query parameter")?;
                match kw.as_str() {
                    "name" => search.name = Some(self.expect_ident("query name")?.0),
                    "comment" => search.doc = Some(self.expect_str("comment text")?),
                    "limit" => {
                        search.limit = self.expect_int("limit value")?;
                        if self.eat_punct(TokKind::Comma) {
                            let (kw, kwpos) = self.expect_ident("`offset`")?;
                            if kw != "offset" {
                                return self.err(kwpos, "expected `offset`");
                            }
                            search.offset = self.expect_int("offset value")?;
                        }
                    }
                    "offset" => search.offset = self.expect_int("offset value")?,
                    "distinct" => {
                        let (fname, dpos) = self.parse_path("distinct path")?;
                        search.distinct = Some(Distinct {
                            fname,
                            strct,
                            pos: dpos,
                        });
                    }
                    "grouprow" => {
                        let (fname, gpos) = self.parse_path("group path")?;
                        search.group = Some(Group {
                            fname,
                            field: FieldId { strct, field: 0 },
                            pos: gpos,
                        });
                    }
                    "maxrow" | "minrow" => {
                        if search.aggr.is_some() {
                            return self.err(kwpos, "duplicate aggregate");
                        }
                        let (fname, apos) = self.parse_path("aggregate path")?;
                        search.aggr = Some(Aggr {
                            fname,
                            op: if kw == "maxrow" {
                                AggrOp::Maxrow
                            } else {
                                AggrOp::Minrow
                            },
                            field: FieldId { strct, field: 0 },
                            pos: apos,
                        });
                    }
                    "order" => loop {
                        let (fname, opos) = self.parse_path("order path")?;
                        let op = if self.eat_kw("desc") {
                            OrdDir::Desc
                        } else {
                            self.eat_kw("asc");
                            OrdDir::Asc
                        };
                        search.ords.push(Ord {
                            fname,
                            op,
                            field: FieldId { strct, field: 0 },
                            pos: opos,
                        });
                        if !self.eat_punct(TokKind::Comma) {
                            break;
                        }
                    },
                    _ => return self.err(kwpos, format!("unknown query parameter `{}`", kw)),
                }
            }
        }
        self.expect_semi()?;

        self.cfg.strcts[strct.0].searches.push(search);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Updates and deletes
    // ------------------------------------------------------------------------

    fn parse_update(&mut self, strct: StrctId, kind: UpdateKind, pos: Pos) -> PResult<()> {
        let mut up = Update {
            kind,
            mrq: Vec::new(),
            crq: Vec::new(),
            name: None,
            doc: None,
            all: false,
            rolemap: None,
            parent: strct,
            pos,
        };

        if kind == UpdateKind::Modify {
            while self.peek_ident().is_some() {
                let (fname, fpos) = self.expect_ident("modified field")?;
                let modifier = match self.peek_ident().and_then(mod_from_name) {
                    Some(m) => {
                        self.i += 1;
                        m
                    }
                    None => ModType::Set,
                };
                up.mrq.push(Uref {
                    field: fname,
                    op: Op::Eq,
                    modifier,
                    pos: fpos,
                });
                if !self.eat_punct(TokKind::Comma) {
                    break;
                }
            }
            if !matches!(self.cur(), Some(t) if t.kind == TokKind::Semi) {
                self.expect_punct(TokKind::Colon, "`:`")?;
            }
        }

        while self.peek_ident().is_some() {
            let (fname, fpos) = self.expect_ident("constraint field")?;
            let op = match self.peek_ident().and_then(op_from_name) {
                Some(op) => {
                    self.i += 1;
                    op
                }
                None => Op::Eq,
            };
            up.crq.push(Uref {
                field: fname,
                op,
                modifier: ModType::Set,
                pos: fpos,
            });
            if !self.eat_punct(TokKind::Comma) {
                break;
            }
        }

        if self.eat_punct(TokKind::Colon) {
            while self.peek_ident().is_some() {
                let (kw, kwpos) = self.expect_ident("operation parameter")?;
                match kw.as_str() {
                    "name" => up.name = Some(self.expect_ident("operation name")?.0),
                    "comment" => up.doc = Some(self.expect_str("comment text")?),
                    _ => {
                        return self.err(kwpos, format!("unknown operation parameter `{}`", kw))
                    }
                }
            }
        }
        self.expect_semi()?;

        up.all = kind == UpdateKind::Modify && up.mrq.is_empty();
        match kind {
            UpdateKind::Modify => self.cfg.strcts[strct.0].updates.push(up),
            UpdateKind::Delete => self.cfg.strcts[strct.0].deletes.push(up),
        }
        Ok(())
    }

    fn parse_unique(&mut self, strct: StrctId, pos: Pos) -> PResult<()> {
        let mut fields = Vec::new();
        loop {
            let (name, _) = self.expect_ident("unique field")?;
            fields.push(name);
            if !self.eat_punct(TokKind::Comma) {
                break;
            }
        }
        self.expect_semi()?;

        if fields.len() < 2 {
            return self.err(pos, "unique clause needs at least two fields");
        }
        self.cfg.strcts[strct.0].uniques.push(Unique {
            fields,
            parent: strct,
            pos,
        });
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Role maps
    // ------------------------------------------------------------------------

    fn parse_rolemap(&mut self, strct: StrctId) -> PResult<()> {
        let mut roles = Vec::new();
        loop {
            let (name, _) = self.expect_ident("role name")?;
            roles.push(name);
            if !self.eat_punct(TokKind::Comma) {
                break;
            }
        }

        self.expect_punct(TokKind::LBrace, "`{`")?;
        while !self.eat_punct(TokKind::RBrace) {
            let (kw, kwpos) = self.expect_ident("role operation")?;
            let kind = match kw.as_str() {
                "all" => RoleMapKind::All,
                "count" => RoleMapKind::Count,
                "delete" => RoleMapKind::Delete,
                "insert" => RoleMapKind::Insert,
                "iterate" => RoleMapKind::Iterate,
                "list" => RoleMapKind::List,
                "search" => RoleMapKind::Search,
                "update" => RoleMapKind::Update,
                "noexport" => RoleMapKind::Noexport,
                _ => return self.err(kwpos, format!("unknown role operation `{}`", kw)),
            };
            let target = self.peek_ident().map(str::to_string);
            if target.is_some() {
                self.i += 1;
            }
            self.expect_semi()?;
            self.pending.rolemaps.push(RolemapReq {
                strct,
                kind,
                roles: roles.clone(),
                target,
                pos: kwpos,
            });
        }
        self.expect_semi()?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Enumerations and bitfields
    // ------------------------------------------------------------------------

    fn parse_label(&mut self) -> PResult<Label> {
        // Caller consumed the `jslabel` keyword.
        let pos = self.cur_pos();
        let lang = if self.eat_punct(TokKind::Dot) {
            let (lang, _) = self.expect_ident("label language")?;
            match self.cfg.langs.iter().position(|l| *l == lang) {
                Some(i) => i,
                None => {
                    self.cfg.langs.push(lang);
                    self.cfg.langs.len() - 1
                }
            }
        } else {
            0
        };
        let text = self.expect_str("label text")?;
        Ok(Label { lang, text, pos })
    }

    fn parse_labels(&mut self) -> PResult<Vec<Label>> {
        let mut labels = Vec::new();
        while self.eat_kw("jslabel") {
            labels.push(self.parse_label()?);
        }
        self.expect_semi()?;
        Ok(labels)
    }

    fn parse_enum(&mut self) -> PResult<()> {
        let (name, pos) = self.expect_ident("enum name")?;
        if self.cfg.find_enum(&name).is_some() {
            return self.err(pos, format!("duplicate enumeration `{}`", name));
        }
        let id = EnmId(self.cfg.enums.len());
        self.cfg.enums.push(Enum {
            id,
            name,
            doc: None,
            items: Vec::new(),
            labels_null: Vec::new(),
            pos,
        });

        self.expect_punct(TokKind::LBrace, "`{`")?;
        while !self.eat_punct(TokKind::RBrace) {
            let (kw, kwpos) = self.expect_ident("enum item")?;
            match kw.as_str() {
                "item" => {
                    let (iname, ipos) = self.expect_ident("item name")?;
                    if self.cfg.enums[id.0]
                        .items
                        .iter()
                        .any(|it| it.name.eq_ignore_ascii_case(&iname))
                    {
                        return self.err(ipos, format!("duplicate item `{}`", iname));
                    }
                    let mut item = EnumItem {
                        name: iname,
                        value: 0,
                        auto: true,
                        doc: None,
                        labels: Vec::new(),
                        pos: ipos,
                        parent: id,
                    };
                    if let Some(Token {
                        kind: TokKind::Integer(v),
                        ..
                    }) = self.cur()
                    {
                        item.value = *v;
                        item.auto = false;
                        self.i += 1;
                    }
                    while !self.eat_punct(TokKind::Semi) {
                        let (akw, apos) = self.expect_ident("item attribute")?;
                        match akw.as_str() {
                            "comment" => item.doc = Some(self.expect_str("comment text")?),
                            "jslabel" => item.labels.push(self.parse_label()?),
                            _ => {
                                return self
                                    .err(apos, format!("unknown item attribute `{}`", akw))
                            }
                        }
                    }
                    self.cfg.enums[id.0].items.push(item);
                }
                "comment" => {
                    let doc = self.expect_str("comment text")?;
                    self.expect_semi()?;
                    self.cfg.enums[id.0].doc = Some(doc);
                }
                "isnull" => {
                    let labels = self.parse_labels()?;
                    self.cfg.enums[id.0].labels_null = labels;
                }
                _ => return self.err(kwpos, format!("unknown enum item `{}`", kw)),
            }
        }
        self.expect_semi()?;

        self.assign_auto_values(id)
    }

    /// Give auto items the lowest unused non-negative values, and reject
    /// duplicate explicit values.
    fn assign_auto_values(&mut self, id: EnmId) -> PResult<()> {
        let enm = &self.cfg.enums[id.0];
        let mut used: Vec<i64> = enm.items.iter().filter(|i| !i.auto).map(|i| i.value).collect();
        for (a, &v) in used.iter().enumerate() {
            if used[..a].contains(&v) {
                let pos = enm.pos.clone();
                return self.err(pos, "duplicate enumeration value");
            }
        }
        let mut next = 0i64;
        for i in 0..self.cfg.enums[id.0].items.len() {
            if !self.cfg.enums[id.0].items[i].auto {
                continue;
            }
            while used.contains(&next) {
                next += 1;
            }
            self.cfg.enums[id.0].items[i].value = next;
            used.push(next);
        }
        Ok(())
    }

    fn parse_bitf(&mut self) -> PResult<()> {
        let (name, pos) = self.expect_ident("bitfield name")?;
        if self.cfg.find_bitf(&name).is_some() {
            return self.err(pos, format!("duplicate bitfield `{}`", name));
        }
        let id = BitfId(self.cfg.bitfs.len());
        self.cfg.bitfs.push(Bitf {
            id,
            name,
            doc: None,
            items: Vec::new(),
            labels_unset: Vec::new(),
            labels_null: Vec::new(),
            pos,
        });

        self.expect_punct(TokKind::LBrace, "`{`")?;
        while !self.eat_punct(TokKind::RBrace) {
            let (kw, kwpos) = self.expect_ident("bitfield item")?;
            match kw.as_str() {
                "item" => {
                    let (iname, ipos) = self.expect_ident("item name")?;
                    if self.cfg.bitfs[id.0]
                        .items
                        .iter()
                        .any(|it| it.name.eq_ignore_ascii_case(&iname))
                    {
                        return self.err(ipos, format!("duplicate item `{}`", iname));
                    }
                    let value = self.expect_int("bit index")?;
                    if !(0..64).contains(&value) {
                        return self.err(ipos, "bit index out of range");
                    }
                    let mut item = BitIndex {
                        name: iname,
                        value,
                        doc: None,
                        labels: Vec::new(),
                        pos: ipos,
                        parent: id,
                    };
                    while !self.eat_punct(TokKind::Semi) {
                        let (akw, apos) = self.expect_ident("item attribute")?;
                        match akw.as_str() {
                            "comment" => item.doc = Some(self.expect_str("comment text")?),
                            "jslabel" => item.labels.push(self.parse_label()?),
                            _ => {
                                return self
                                    .err(apos, format!("unknown item attribute `{}`", akw))
                            }
                        }
                    }
                    self.cfg.bitfs[id.0].items.push(item);
                }
                "comment" => {
                    let doc = self.expect_str("comment text")?;
                    self.expect_semi()?;
                    self.cfg.bitfs[id.0].doc = Some(doc);
                }
                "isunset" => {
                    let labels = self.parse_labels()?;
                    self.cfg.bitfs[id.0].labels_unset = labels;
                }
                "isnull" => {
                    let labels = self.parse_labels()?;
                    self.cfg.bitfs[id.0].labels_null = labels;
                }
                _ => return self.err(kwpos, format!("unknown bitfield item `{}`", kw)),
            }
        }
        self.expect_semi()?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Roles
    // ------------------------------------------------------------------------

    fn parse_roles_block(&mut self, pos: Pos) -> PResult<()> {
        if self.cfg.roles_enabled() {
            return self.err(pos, "roles already declared");
        }
        for name in ["all", "default", "none"] {
            let id = RoleId(self.cfg.roles.len());
            self.cfg.roles.push(Role {
                id,
                name: name.into(),
                doc: None,
                parent: None,
                children: Vec::new(),
                pos: pos.clone(),
            });
        }

        self.expect_punct(TokKind::LBrace, "`{`")?;
        while !self.eat_punct(TokKind::RBrace) {
            let (kw, kwpos) = self.expect_ident("role declaration")?;
            if kw != "role" {
                return self.err(kwpos, format!("expected `role`, found `{}`", kw));
            }
            self.parse_role(RoleId(0))?;
        }
        self.expect_semi()?;
        Ok(())
    }

    fn parse_role(&mut self, parent: RoleId) -> PResult<()> {
        let (name, pos) = self.expect_ident("role name")?;
        if self.cfg.find_role(&name).is_some() {
            return self.err(pos, format!("duplicate role `{}`", name));
        }

        let id = RoleId(self.cfg.roles.len());
        self.cfg.roles.push(Role {
            id,
            name,
            doc: None,
            parent: Some(parent),
            children: Vec::new(),
            pos,
        });
        self.cfg.roles[parent.0].children.push(id);

        if self.eat_kw("comment") {
            self.cfg.roles[id.0].doc = Some(self.expect_str("comment text")?);
        }
        if self.eat_punct(TokKind::LBrace) {
            while !self.eat_punct(TokKind::RBrace) {
                let (kw, kwpos) = self.expect_ident("role declaration")?;
                if kw != "role" {
                    return self.err(kwpos, format!("expected `role`, found `{}`", kw));
                }
                self.parse_role(id)?;
            }
        }
        self.expect_semi()?;
        Ok(())
    }
}

fn op_from_name(name: &str) -> Option<Op> {
    Some(match name {
        "eq" => Op::Eq,
        "ge" => Op::Ge,
        "gt" => Op::Gt,
        "le" => Op::Le,
        "lt" => Op::Lt,
        "neq" => Op::Neq,
        "like" => Op::Like,
        "and" => Op::And,
        "or" => Op::Or,
        "streq" => Op::Streq,
        "strneq" => Op::Strneq,
        "isnull" => Op::Isnull,
        "notnull" => Op::Notnull,
        _ => return None,
    })
}

fn mod_from_name(name: &str) -> Option<ModType> {
    Some(match name {
        "concat" => ModType::Concat,
        "dec" => ModType::Dec,
        "inc" => ModType::Inc,
        "set" => ModType::Set,
        "strset" => ModType::Strset,
        _ => return None,
    })
}
