use nom::{
    branch::alt,
    bytes::complete::{escaped_transform, is_not, tag, take_while},
    character::complete::{char, digit1, hex_digit1, one_of},
    combinator::{all_consuming, map, map_opt, map_res, opt, recognize, value},
    multi::separated_list0,
    sequence::{delimited, pair, preceded, separated_pair, terminated, tuple},
    Finish,
    IResult,
};
use anyhow::{anyhow, Result};
use vpack::{Object, Value};

const WHITESPACE: &str = " \t\r\n";
const B64_CHARS: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/=";

fn white(i: &str) -> IResult<&str, &str> {
    take_while(move |c| WHITESPACE.contains(c))(i)
}

fn keyword(i: &str) -> IResult<&str, Value> {
    alt((
        value(Value::Null, tag("null")),
        value(Value::Bool(true), tag("true")),
        value(Value::Bool(false), tag("false")),
        value(Value::Double(f64::INFINITY), tag("inf")),
        value(Value::Double(f64::NEG_INFINITY), tag("-inf")),
        value(Value::Double(f64::NAN), tag("NaN")),
    ))(i)
}

/// Integers without suffix are signed unless they only fit into an unsigned integer
fn to_number(n: &str, unsigned: bool) -> Result<Value, String> {
    if unsigned {
        n.parse().map(Value::UInt).map_err(|e| format!("{}: {}", n, e))
    } else if n.contains(['.', 'e', 'E']) {
        n.parse().map(Value::Double).map_err(|e| format!("{}: {}", n, e))
    } else {
        n.parse().map(Value::Int)
            .or_else(|_| n.parse().map(Value::UInt))
            .map_err(|e| format!("{}: {}", n, e))
    }
}

fn number(i: &str) -> IResult<&str, Value> {
    map_res(
        pair(
            recognize(tuple((
                opt(char('-')),
                digit1,
                opt(pair(char('.'), digit1)),
                opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
            ))),
            opt(char('u')),
        ),
        |(n, suffix)| to_number(n, suffix.is_some()),
    )(i)
}

fn unicode(i: &str) -> IResult<&str, char> {
    map_opt(
        delimited(tag("u{"), hex_digit1, char('}')),
        |h| u32::from_str_radix(h, 16).ok().and_then(char::from_u32),
    )(i)
}

fn string(i: &str) -> IResult<&str, String> {
    delimited(
        char('"'),
        map(opt(escaped_transform(
            is_not("\\\""),
            '\\',
            alt((
                value('\\', char('\\')),
                value('"', char('"')),
                value('\n', char('n')),
                value('\r', char('r')),
                value('\t', char('t')),
                unicode,
            )),
        )), Option::unwrap_or_default),
        char('"'),
    )(i)
}

fn binary(i: &str) -> IResult<&str, Vec<u8>> {
    map_res(
        delimited(tag("b'"), take_while(move |c| B64_CHARS.contains(c)), char('\'')),
        base64::decode,
    )(i)
}

fn array(i: &str) -> IResult<&str, Vec<Value>> {
    delimited(
        pair(char('['), white),
        terminated(separated_list0(char(','), vpack_value), pair(opt(char(',')), white)),
        char(']'),
    )(i)
}

fn member(i: &str) -> IResult<&str, (String, Value)> {
    separated_pair(preceded(white, string), preceded(white, char(':')), vpack_value)(i)
}

/// Objects keep their members in the order they were written, repeated keys are rejected
fn object(i: &str) -> IResult<&str, Object> {
    map_res(
        delimited(
            pair(char('{'), white),
            terminated(separated_list0(char(','), member), pair(opt(char(',')), white)),
            char('}'),
        ),
        |members| {
            let mut object = Object::with_capacity(members.len());
            for (key, member) in members {
                if object.contains_key(&key) {
                    return Err(format!("duplicate key {:?}", key));
                }
                object.insert(key, member);
            }
            Ok(object)
        },
    )(i)
}

fn vpack_value(i: &str) -> IResult<&str, Value> {
    delimited(
        white,
        alt((
            map(string, Value::String),
            map(binary, Value::Binary),
            map(array, Value::Array),
            map(object, Value::Object),
            number,
            keyword,
        )),
        white,
    )(i)
}

pub fn parse(i: &str) -> Result<Value> {
    let (_, value) = all_consuming(vpack_value)(i).finish()
        .map_err(|e| anyhow!("Invalid input at offset {}: {:?}", i.len() - e.input.len(), e.code))?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalars() {
        assert_eq!(Value::Null, parse("null").unwrap());
        assert_eq!(Value::Bool(false), parse(" false\n").unwrap());
        assert_eq!(Value::Int(-12), parse("-12").unwrap());
        assert_eq!(Value::UInt(12), parse("12u").unwrap());
        assert_eq!(Value::UInt(u64::MAX), parse("18446744073709551615").unwrap());
        assert_eq!(Value::Int(i64::MIN), parse("-9223372036854775808").unwrap());
        assert_eq!(Value::Double(-2.5e10), parse("-2.5e10").unwrap());
        assert_eq!(Value::Double(1.0), parse("1.0").unwrap());
        assert_eq!(Value::Double(f64::NEG_INFINITY), parse("-inf").unwrap());
        assert!(parse("NaN").unwrap().as_f64().unwrap().is_nan());
        assert_eq!(Value::Binary(vec![0xde, 0xad]), parse("b'3q0='").unwrap());
    }

    #[test]
    fn strings() {
        assert_eq!(Value::from(""), parse(r#""""#).unwrap());
        assert_eq!(Value::from("say \"hi\"\n\\"), parse(r#""say \"hi\"\n\\""#).unwrap());
        assert_eq!(Value::from("\u{7}bell"), parse(r#""\u{7}bell""#).unwrap());
    }

    #[test]
    fn containers() {
        assert_eq!(Value::Array(vec![]), parse("[ ]").unwrap());
        assert_eq!(Value::array([1u8, 2u8]), parse("[1u, 2u,\n]").unwrap());
        let value = parse(r#"{"name": "Kitty", "tags": ["a"], "empty": {}}"#).unwrap();
        assert_eq!(Some("Kitty"), value.get("name").and_then(Value::as_str));
        let keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(vec!["name", "tags", "empty"], keys);
    }

    #[test]
    fn invalid_input() {
        assert!(parse("").is_err());
        assert!(parse("[1 2]").is_err());
        assert!(parse("-1u").is_err());
        assert!(parse("1.5u").is_err());
        assert!(parse(r#"{"a": 1, "a": 2}"#).is_err());
        assert!(parse(r#"{"a" 1}"#).is_err());
        assert!(parse("nul").is_err());
    }

    #[test]
    fn reads_what_display_writes() {
        let value = Value::object([
            ("name", Value::from("Jessica \"Jess\"\t")),
            ("age", Value::from(3u8)),
            ("balance", Value::Int(-40)),
            ("weight", Value::from(4.0)),
            ("tiny", Value::from(1e-300)),
            ("tags", Value::array(["cat", "fishing"])),
            ("chip", Value::Binary(vec![0xde, 0xad, 0xbe])),
            ("owner", Value::Null),
            ("nested", Value::object([("deep", Value::array([Value::array(Vec::<Value>::new())]))])),
        ]);
        assert_eq!(value, parse(&value.to_string()).unwrap());
        assert_eq!(value, parse(&format!("{:#}", value)).unwrap());
    }

}
