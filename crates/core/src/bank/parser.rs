//! ISO 20022 camt.052 / camt.053 parser.
//!
//! The document is first read into a small owned element tree, then the
//! statement is extracted by path. Only the subset of the schema needed for
//! ledger processing is read; everything else is ignored.

use std::str::FromStr;

use chrono::NaiveDate;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use rust_decimal::Decimal;
use tracing::debug;

use super::error::StatementParseError;
use super::statement::{
    BalanceType, BankStatement, BankStatementBalance, BankStatementEntry, CounterParty,
    ResolvedDetails, StatementKind,
};

/// End-to-end id placeholder banks use when the originator supplied none.
const NOT_PROVIDED: &str = "NOTPROVIDED";

/// Parses a camt.052 or camt.053 document.
///
/// # Errors
///
/// Fails closed on malformed XML, a missing or foreign namespace, a missing
/// `Document` root or statement container, and on entries without exactly
/// one counter-party or exactly one remittance line. One bad entry rejects
/// the whole document, so no entry of it reaches the ledger.
pub fn parse_statement(xml: &str) -> Result<BankStatement, StatementParseError> {
    let root = read_tree(xml)?;
    if root.name != "Document" {
        return Err(StatementParseError::MissingElement("Document".to_string()));
    }

    let namespace = root.namespace().ok_or(StatementParseError::MissingNamespace)?;
    let kind = if namespace.contains("camt.053") {
        StatementKind::Statement
    } else if namespace.contains("camt.052") {
        StatementKind::IntradayReport
    } else {
        return Err(StatementParseError::UnsupportedNamespace(namespace.to_string()));
    };

    let (message, container) = match kind {
        StatementKind::Statement => ("BkToCstmrStmt", "Stmt"),
        StatementKind::IntradayReport => ("BkToCstmrAcctRpt", "Rpt"),
    };
    let message = root
        .child(message)
        .ok_or_else(|| StatementParseError::MissingElement(message.to_string()))?;
    let containers: Vec<&Element> = message.children(container).collect();
    let [statement] = containers.as_slice() else {
        return Err(StatementParseError::ElementCount {
            element: container,
            count: containers.len(),
        });
    };

    let statement_id = required_text(statement, &["Id"], container)?;
    let account_iban = required_text(statement, &["Acct", "Id", "IBAN"], container)?;

    let mut balances = Vec::new();
    for balance in statement.children("Bal") {
        if let Some(parsed) = parse_balance(balance)? {
            balances.push(parsed);
        }
    }

    let entries = statement
        .children("Ntry")
        .map(parse_entry)
        .collect::<Result<Vec<_>, _>>()?;

    debug!(
        kind = kind.message_name(),
        statement_id = %statement_id,
        account_iban = %account_iban,
        entries = entries.len(),
        "Parsed bank statement"
    );

    Ok(BankStatement {
        kind,
        statement_id,
        account_iban,
        balances,
        entries,
    })
}

fn parse_balance(node: &Element) -> Result<Option<BankStatementBalance>, StatementParseError> {
    let code = required_text(node, &["Tp", "CdOrPrtry", "Cd"], "Bal")?;
    let Some(balance_type) = BalanceType::parse(&code) else {
        debug!(code = %code, "Ignoring unsupported balance type");
        return Ok(None);
    };
    let (amount, currency) = signed_amount(node, "Bal")?;
    let date = date_in(node, "Dt", "Bal")?;
    Ok(Some(BankStatementBalance {
        balance_type,
        amount,
        currency,
        date,
    }))
}

fn parse_entry(node: &Element) -> Result<BankStatementEntry, StatementParseError> {
    let transactions = node.all(&["NtryDtls", "TxDtls"]);

    let external_id = node
        .text_at(&["AcctSvcrRef"])
        .or_else(|| {
            transactions
                .iter()
                .find_map(|tx| tx.text_at(&["Refs", "AcctSvcrRef"]))
        })
        .ok_or_else(|| StatementParseError::MissingElement("Ntry/AcctSvcrRef".to_string()))?
        .to_string();

    let (amount, currency) = signed_amount(node, "Ntry")?;
    let booking_date = date_in(node, "BookgDt", "Ntry")?;
    let sub_family_code = node
        .text_at(&["BkTxCd", "Domn", "Fmly", "SubFmlyCd"])
        .map(str::to_string);

    // The counter-party is the debtor of a credit and the creditor of a debit.
    let (party_tag, account_tag) = if amount.is_sign_negative() {
        ("Cdtr", "CdtrAcct")
    } else {
        ("Dbtr", "DbtrAcct")
    };
    let parties: Vec<&Element> = transactions
        .iter()
        .flat_map(|tx| tx.all(&["RltdPties", party_tag]))
        .collect();
    let [party] = parties.as_slice() else {
        return Err(StatementParseError::CounterPartyCount {
            external_id,
            count: parties.len(),
        });
    };
    let counter_party = CounterParty {
        name: party
            .text_at(&["Nm"])
            .or_else(|| party.text_at(&["Pty", "Nm"]))
            .ok_or_else(|| StatementParseError::MissingElement(format!("{party_tag}/Nm")))?
            .to_string(),
        iban: transactions
            .iter()
            .find_map(|tx| tx.text_at(&["RltdPties", account_tag, "Id", "IBAN"]))
            .map(str::to_string),
        personal_id: party
            .text_at(&["Id", "PrvtId", "Othr", "Id"])
            .or_else(|| party.text_at(&["Pty", "Id", "PrvtId", "Othr", "Id"]))
            .map(str::to_string),
    };

    let remittances: Vec<&Element> = transactions
        .iter()
        .flat_map(|tx| tx.all(&["RmtInf", "Ustrd"]))
        .collect();
    let [remittance] = remittances.as_slice() else {
        return Err(StatementParseError::RemittanceCount {
            external_id,
            count: remittances.len(),
        });
    };

    let end_to_end_id = transactions
        .iter()
        .find_map(|tx| tx.text_at(&["Refs", "EndToEndId"]))
        .filter(|id| *id != NOT_PROVIDED)
        .map(str::to_string);

    let details = counter_party
        .personal_id
        .clone()
        .map(|personal_id| ResolvedDetails { personal_id });

    Ok(BankStatementEntry {
        counter_party,
        amount,
        currency,
        sub_family_code,
        remittance_information: remittance.text.trim().to_string(),
        external_id,
        end_to_end_id,
        booking_date,
        details,
    })
}

/// Reads `Amt` with its `Ccy` attribute and applies the `CdtDbtInd` sign.
fn signed_amount(node: &Element, context: &str) -> Result<(Decimal, String), StatementParseError> {
    let amt = node
        .child("Amt")
        .ok_or_else(|| StatementParseError::MissingElement(format!("{context}/Amt")))?;
    let value = Decimal::from_str(amt.text.trim())
        .map_err(|_| StatementParseError::InvalidAmount(amt.text.clone()))?;
    let currency = amt
        .attribute("Ccy")
        .ok_or_else(|| StatementParseError::MissingElement(format!("{context}/Amt/@Ccy")))?
        .to_string();
    let indicator = required_text(node, &["CdtDbtInd"], context)?;
    let signed = match indicator.as_str() {
        "CRDT" => value,
        "DBIT" => -value,
        _ => return Err(StatementParseError::InvalidIndicator(indicator)),
    };
    Ok((signed, currency))
}

/// Reads `<wrapper><Dt>` or `<wrapper><DtTm>` as a date.
fn date_in(node: &Element, wrapper: &str, context: &str) -> Result<NaiveDate, StatementParseError> {
    let raw = node
        .text_at(&[wrapper, "Dt"])
        .or_else(|| node.text_at(&[wrapper, "DtTm"]))
        .ok_or_else(|| StatementParseError::MissingElement(format!("{context}/{wrapper}/Dt")))?;
    let day = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .map_err(|_| StatementParseError::InvalidDate(raw.to_string()))
}

fn required_text(
    node: &Element,
    path: &[&str],
    context: &str,
) -> Result<String, StatementParseError> {
    node.text_at(path)
        .map(str::to_string)
        .ok_or_else(|| StatementParseError::MissingElement(format!("{context}/{}", path.join("/"))))
}

/// Owned XML element with local name, raw attributes and accumulated text.
#[derive(Debug, Default)]
struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    text: String,
    children: Vec<Element>,
}

impl Element {
    fn open(start: &BytesStart<'_>) -> Self {
        let attributes = start
            .attributes()
            .flatten()
            .map(|a| {
                (
                    String::from_utf8_lossy(a.key.as_ref()).into_owned(),
                    String::from_utf8_lossy(&a.value).into_owned(),
                )
            })
            .collect();
        Self {
            name: String::from_utf8_lossy(start.local_name().as_ref()).into_owned(),
            attributes,
            ..Self::default()
        }
    }

    fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Default namespace, or the first prefixed one for prefixed roots.
    fn namespace(&self) -> Option<&str> {
        self.attribute("xmlns").or_else(|| {
            self.attributes
                .iter()
                .find(|(k, _)| k.starts_with("xmlns:"))
                .map(|(_, v)| v.as_str())
        })
    }

    fn child(&self, name: &str) -> Option<&Self> {
        self.children.iter().find(|c| c.name == name)
    }

    fn children<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Self> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Every descendant reachable along `path`.
    fn all(&self, path: &[&str]) -> Vec<&Self> {
        match path.split_first() {
            None => vec![self],
            Some((head, rest)) => self
                .children
                .iter()
                .filter(|c| c.name == *head)
                .flat_map(|c| c.all(rest))
                .collect(),
        }
    }

    /// Trimmed, non-empty text of the first element along `path`.
    fn text_at(&self, path: &[&str]) -> Option<&str> {
        self.all(path)
            .into_iter()
            .map(|e| e.text.trim())
            .find(|t| !t.is_empty())
    }
}

fn read_tree(xml: &str) -> Result<Element, StatementParseError> {
    let mut reader = Reader::from_reader(xml.as_bytes());
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event_into(&mut buf).map_err(xml_error)? {
            Event::Start(start) => stack.push(Element::open(&start)),
            Event::Empty(start) => attach(&mut stack, &mut root, Element::open(&start)),
            Event::Text(text) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&text.unescape().map_err(xml_error)?);
                }
            }
            Event::CData(data) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Event::End(_) => {
                if let Some(element) = stack.pop() {
                    attach(&mut stack, &mut root, element);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !stack.is_empty() {
        return Err(StatementParseError::Xml(
            "unexpected end of document".to_string(),
        ));
    }
    root.ok_or_else(|| StatementParseError::MissingElement("Document".to_string()))
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => {
            if root.is_none() {
                *root = Some(element);
            }
        }
    }
}

fn xml_error<E: std::fmt::Display>(err: E) -> StatementParseError {
    StatementParseError::Xml(err.to_string())
}
