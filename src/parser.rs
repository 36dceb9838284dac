use nom::{
    branch::alt,
    bytes::complete::{tag_no_case, take_until, take_while, take_while1},
    character::complete::{char, digit1, multispace0, multispace1},
    combinator::{map, map_res, opt, recognize},
    multi::{many0, many1},
    sequence::{delimited, preceded, tuple},
    IResult,
};
use uuid::Uuid;

use crate::model::ClassificationLabel;

/// Optional clauses of a LIST command.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct ListArgs {
    pub label_type: Option<String>,
    pub min_confidence: Option<f64>,
    pub max_confidence: Option<f64>,
    pub sort: Option<String>,
    pub order: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

impl ListArgs {
    /// Query-string pairs for `GET /classifications`.
    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(t) = &self.label_type { pairs.push(("type", t.clone())); }
        if let Some(v) = self.min_confidence { pairs.push(("min_confidence", v.to_string())); }
        if let Some(v) = self.max_confidence { pairs.push(("max_confidence", v.to_string())); }
        if let Some(s) = &self.sort { pairs.push(("sort", s.clone())); }
        if let Some(o) = &self.order { pairs.push(("order", o.clone())); }
        if let Some(p) = self.page { pairs.push(("page", p.to_string())); }
        if let Some(l) = self.limit { pairs.push(("limit", l.to_string())); }
        pairs
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum Command {
    List(ListArgs),
    Get { id: Uuid },
    Rename { id: Uuid, name: String },
    Label { id: Uuid, labels: Vec<ClassificationLabel> },
    Add { name: String, labels: Vec<ClassificationLabel> },
    Undo { id: Uuid },
    Health,
    Help,
    Exit,
}

enum ListClause {
    Type(String),
    Min(f64),
    Max(f64),
    Sort(String, Option<String>),
    Page(u64),
    Limit(u64),
}

// --- BASIC PARSERS ---

fn parse_float(input: &str) -> IResult<&str, f64> {
    map_res(
        recognize(tuple((
            opt(char('-')),
            digit1,
            opt(tuple((char('.'), digit1))),
        ))),
        |s: &str| s.parse::<f64>(),
    )(input)
}

fn parse_u64(input: &str) -> IResult<&str, u64> {
    map_res(digit1, |s: &str| s.parse::<u64>())(input)
}

fn parse_quoted_string(input: &str) -> IResult<&str, String> {
    let (input, _) = char('"')(input)?;
    let (input, content) = take_until("\"")(input)?;
    let (input, _) = char('"')(input)?;
    Ok((input, content.to_string()))
}

fn parse_uuid(input: &str) -> IResult<&str, Uuid> {
    let (rest, uuid_str) = delimited(
        opt(char('\'')),
        take_while(|c: char| c.is_ascii_hexdigit() || c == '-'),
        opt(char('\'')),
    )(input)?;
    match Uuid::parse_str(uuid_str) {
        Ok(uuid) => Ok((rest, uuid)),
        Err(_) => Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag))),
    }
}

fn parse_word(input: &str) -> IResult<&str, String> {
    map(take_while1(|c: char| c.is_ascii_alphabetic()), str::to_lowercase)(input)
}

fn parse_labels(input: &str) -> IResult<&str, Vec<ClassificationLabel>> {
    many1(map(
        tuple((ws(parse_quoted_string), ws(parse_float))),
        |(label, score)| ClassificationLabel { label, score },
    ))(input)
}

// --- HELPERS ---
fn ws<'a, F, O, E: nom::error::ParseError<&'a str>>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O, E>
where F: FnMut(&'a str) -> IResult<&'a str, O, E> {
    delimited(multispace0, inner, multispace0)
}

fn tag_ci(t: &'static str) -> impl FnMut(&str) -> IResult<&str, &str> {
    move |input| tag_no_case(t)(input)
}

// --- COMMAND PARSERS ---

fn parse_list_clause(input: &str) -> IResult<&str, ListClause> {
    ws(alt((
        map(preceded(ws(tag_ci("TYPE")), parse_quoted_string), ListClause::Type),
        map(preceded(ws(tag_ci("MIN")), parse_float), ListClause::Min),
        map(preceded(ws(tag_ci("MAX")), parse_float), ListClause::Max),
        map(
            tuple((
                preceded(ws(tag_ci("SORT")), parse_word),
                opt(preceded(multispace1, alt((tag_ci("ASC"), tag_ci("DESC"))))),
            )),
            |(key, order)| ListClause::Sort(key, order.map(str::to_lowercase)),
        ),
        map(preceded(ws(tag_ci("PAGE")), parse_u64), ListClause::Page),
        map(preceded(ws(tag_ci("LIMIT")), parse_u64), ListClause::Limit),
    )))(input)
}

fn parse_list(input: &str) -> IResult<&str, Command> {
    let (input, _) = alt((tag_ci("LIST"), tag_ci("LS")))(input)?;
    let (input, clauses) = many0(parse_list_clause)(input)?;

    let mut args = ListArgs::default();
    for clause in clauses {
        match clause {
            ListClause::Type(t) => args.label_type = Some(t),
            ListClause::Min(v) => args.min_confidence = Some(v),
            ListClause::Max(v) => args.max_confidence = Some(v),
            ListClause::Sort(key, order) => {
                args.sort = Some(key);
                args.order = order;
            }
            ListClause::Page(p) => args.page = Some(p),
            ListClause::Limit(l) => args.limit = Some(l),
        }
    }
    Ok((input, Command::List(args)))
}

fn parse_get(input: &str) -> IResult<&str, Command> {
    let (input, _) = tag_ci("GET")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, id) = parse_uuid(input)?;
    Ok((input, Command::Get { id }))
}

fn parse_rename(input: &str) -> IResult<&str, Command> {
    let (input, _) = tag_ci("RENAME")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, id) = parse_uuid(input)?;
    let (input, name) = preceded(multispace1, parse_quoted_string)(input)?;
    Ok((input, Command::Rename { id, name }))
}

fn parse_label(input: &str) -> IResult<&str, Command> {
    let (input, _) = tag_ci("LABEL")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, id) = parse_uuid(input)?;
    let (input, labels) = parse_labels(input)?;
    Ok((input, Command::Label { id, labels }))
}

fn parse_add(input: &str) -> IResult<&str, Command> {
    let (input, _) = tag_ci("ADD")(input)?;
    let (input, name) = ws(parse_quoted_string)(input)?;
    let (input, labels) = opt(parse_labels)(input)?;
    Ok((input, Command::Add { name, labels: labels.unwrap_or_default() }))
}

fn parse_undo(input: &str) -> IResult<&str, Command> {
    let (input, _) = tag_ci("UNDO")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, id) = parse_uuid(input)?;
    Ok((input, Command::Undo { id }))
}

fn parse_health(input: &str) -> IResult<&str, Command> {
    let (input, _) = alt((tag_ci("HEALTH"), tag_ci("STATUS")))(input)?;
    Ok((input, Command::Health))
}

fn parse_help(input: &str) -> IResult<&str, Command> {
    let (input, _) = tag_ci("HELP")(input)?;
    Ok((input, Command::Help))
}

fn parse_exit(input: &str) -> IResult<&str, Command> {
    let (input, _) = alt((tag_ci("EXIT"), tag_ci("QUIT")))(input)?;
    Ok((input, Command::Exit))
}

pub fn parse_command(input: &str) -> Result<Command, String> {
    let input = input.trim();
    let result = alt((
        parse_list,
        parse_get,
        parse_rename,
        parse_label,
        parse_add,
        parse_undo,
        parse_health,
        parse_help,
        parse_exit,
    ))(input);

    match result {
        Ok((remainder, cmd)) => {
            if !remainder.trim().is_empty() {
                return Err(format!("Unexpected tokens at end: '{}'", remainder));
            }
            Ok(cmd)
        },
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            let context: String = e.input.chars().take(20).collect();
            let ellipsis = if e.input.chars().count() > 20 { "..." } else { "" };
            Err(format!("Invalid syntax near: '{}{}'", context, ellipsis))
        },
        Err(nom::Err::Incomplete(_)) => Err("Incomplete command.".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "67e55044-10b1-426f-9247-bb680e5fe0c8";

    fn id() -> Uuid {
        Uuid::parse_str(ID).unwrap()
    }

    #[test]
    fn bare_list_has_no_clauses() {
        assert_eq!(parse_command("list").unwrap(), Command::List(ListArgs::default()));
    }

    #[test]
    fn list_clauses_in_any_order() {
        let cmd = parse_command(r#"LIST LIMIT 10 SORT confidence DESC TYPE "inv" MIN 0.5 PAGE 2"#).unwrap();
        let Command::List(args) = cmd else { panic!("expected LIST") };
        assert_eq!(args.label_type.as_deref(), Some("inv"));
        assert_eq!(args.min_confidence, Some(0.5));
        assert_eq!(args.max_confidence, None);
        assert_eq!(args.sort.as_deref(), Some("confidence"));
        assert_eq!(args.order.as_deref(), Some("desc"));
        assert_eq!(args.page, Some(2));
        assert_eq!(args.limit, Some(10));

        let query = args.to_query();
        assert!(query.contains(&("type", "inv".to_string())));
        assert!(query.contains(&("order", "desc".to_string())));
    }

    #[test]
    fn parses_id_commands() {
        assert_eq!(parse_command(&format!("GET {ID}")).unwrap(), Command::Get { id: id() });
        assert_eq!(parse_command(&format!("undo '{ID}'")).unwrap(), Command::Undo { id: id() });
        assert_eq!(
            parse_command(&format!(r#"RENAME {ID} "contract.pdf""#)).unwrap(),
            Command::Rename { id: id(), name: "contract.pdf".into() }
        );
    }

    #[test]
    fn parses_label_lists() {
        let cmd = parse_command(&format!(r#"LABEL {ID} "invoice" 0.9 "receipt" 0.1"#)).unwrap();
        assert_eq!(
            cmd,
            Command::Label {
                id: id(),
                labels: vec![ClassificationLabel::new("invoice", 0.9), ClassificationLabel::new("receipt", 0.1)],
            }
        );

        let cmd = parse_command(r#"ADD "scan.pdf" "invoice" 1"#).unwrap();
        assert_eq!(
            cmd,
            Command::Add { name: "scan.pdf".into(), labels: vec![ClassificationLabel::new("invoice", 1.0)] }
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_command("GET not-a-uuid").is_err());
        assert!(parse_command("LIST LIMIT ten").is_err());
        assert!(parse_command(&format!("LABEL {ID}")).is_err());
        assert!(parse_command("DROP TABLE").is_err());
    }

    #[test]
    fn simple_keywords() {
        assert_eq!(parse_command("health").unwrap(), Command::Health);
        assert_eq!(parse_command("HELP").unwrap(), Command::Help);
        assert_eq!(parse_command("quit").unwrap(), Command::Exit);
    }
}
