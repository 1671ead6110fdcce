use crate::errors::ParseError;
use crate::event_tree::{NodeID, Tree};
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// A node parsed from a NHX-formatted tree: a name, a branch length
/// (preserved verbatim but otherwise unused) and an ordered map of
/// custom `key=value` tags.
///
/// The accepted grammar is:
///
/// ```text
/// tree            ::= subtree ';'
/// subtree         ::= children? node
/// children        ::= '(' subtree (',' subtree)* ')'
/// node            ::= name? length? tagmap?
/// name            ::= ident
/// length          ::= ':' <double>
/// tagmap          ::= '[&&NHX' tag+ ']'
/// tag             ::= ':' ident '=' ident
/// ident           ::= quoted_string | unquoted_string
/// quoted_string   ::= '"' ('""' | [^"])* '"'
/// unquoted_string ::= [^()[],:;= \t\r\n]+
/// ```
///
/// Whitespace and comments (square brackets not opening with `&&NHX`)
/// are skipped between tokens.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaggedNode {
    pub name: String,
    pub length: f64,
    pub tags: BTreeMap<String, String>,
}

const DELIMITERS: &str = "()[],:;= \t\r\n\"";

struct Cursor {
    chars: Vec<char>,
    pos: usize,
}

impl Cursor {
    fn new(input: &str) -> Self {
        Cursor { chars: input.chars().collect(), pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn lookahead(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn found(&self) -> String {
        match self.peek() {
            Some(c) => format!("'{}'", c),
            None => "<end>".to_owned(),
        }
    }

    fn expect(&mut self, wanted: char) -> Result<(), ParseError> {
        match self.peek() {
            Some(c) if c == wanted => {
                self.pos += 1;
                Ok(())
            }
            Some(_) => Err(ParseError::Syntax {
                offset: self.pos,
                expected: format!("'{}'", wanted),
                found: self.found(),
            }),
            None => Err(ParseError::UnexpectedEnd {
                offset: self.pos,
                expected: format!("'{}'", wanted),
            }),
        }
    }

    fn starts_nhx(&self) -> bool {
        "[&&NHX"
            .chars()
            .enumerate()
            .all(|(i, c)| self.lookahead(i) == Some(c))
    }

    /// Skip whitespace and comments. Brackets that open a `[&&NHX` tag
    /// list are not comments and stop the skipping.
    fn skip(&mut self) -> Result<(), ParseError> {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.pos += 1;
                }
                Some('[') if !self.starts_nhx() => {
                    let open = self.pos;
                    self.pos += 1;
                    while let Some(c) = self.bump() {
                        if c == ']' {
                            break;
                        }
                    }
                    if self.pos > self.chars.len()
                        || self.chars.get(self.pos - 1) != Some(&']')
                    {
                        return Err(ParseError::UnexpectedEnd {
                            offset: open,
                            expected: "']'".to_owned(),
                        });
                    }
                }
                _ => return Ok(()),
            }
        }
    }
}

struct RawTree {
    node: TaggedNode,
    children: Vec<RawTree>,
}

fn parse_ident(cursor: &mut Cursor) -> Result<Option<String>, ParseError> {
    match cursor.peek() {
        Some('"') => {
            cursor.pos += 1;
            let mut out = String::new();

            loop {
                match cursor.bump() {
                    Some('"') => {
                        // A doubled quote stands for a literal one
                        if cursor.peek() == Some('"') {
                            cursor.pos += 1;
                            out.push('"');
                        } else {
                            return Ok(Some(out));
                        }
                    }
                    Some(c) => out.push(c),
                    None => {
                        return Err(ParseError::UnexpectedEnd {
                            offset: cursor.pos,
                            expected: "'\"'".to_owned(),
                        })
                    }
                }
            }
        }
        Some(c) if !DELIMITERS.contains(c) => {
            let mut out = String::new();
            while let Some(c) = cursor.peek() {
                if DELIMITERS.contains(c) {
                    break;
                }
                out.push(c);
                cursor.pos += 1;
            }
            Ok(Some(out))
        }
        _ => Ok(None),
    }
}

fn parse_length(cursor: &mut Cursor) -> Result<f64, ParseError> {
    let start = cursor.pos;
    let mut text = String::new();

    while let Some(c) = cursor.peek() {
        if c.is_ascii_digit() || "+-.eE".contains(c) {
            text.push(c);
            cursor.pos += 1;
        } else {
            break;
        }
    }

    text.parse::<f64>().map_err(|_| ParseError::Syntax {
        offset: start,
        expected: "<number>".to_owned(),
        found: if text.is_empty() { cursor.found() } else { format!("'{}'", text) },
    })
}

fn parse_tagmap(
    cursor: &mut Cursor,
) -> Result<BTreeMap<String, String>, ParseError> {
    for wanted in "[&&NHX".chars() {
        cursor.expect(wanted)?;
    }

    let mut tags = BTreeMap::new();

    loop {
        cursor.skip()?;
        match cursor.peek() {
            Some(':') => {
                cursor.pos += 1;
                cursor.skip()?;
                let key = parse_ident(cursor)?.ok_or_else(|| ParseError::Syntax {
                    offset: cursor.pos,
                    expected: "<ident>".to_owned(),
                    found: cursor.found(),
                })?;
                cursor.skip()?;
                cursor.expect('=')?;
                cursor.skip()?;
                let value = parse_ident(cursor)?.ok_or_else(|| ParseError::Syntax {
                    offset: cursor.pos,
                    expected: "<ident>".to_owned(),
                    found: cursor.found(),
                })?;
                tags.insert(key, value);
            }
            Some(']') => {
                cursor.pos += 1;
                if tags.is_empty() {
                    return Err(ParseError::Syntax {
                        offset: cursor.pos - 1,
                        expected: "':'".to_owned(),
                        found: "']'".to_owned(),
                    });
                }
                return Ok(tags);
            }
            Some(_) => {
                return Err(ParseError::Syntax {
                    offset: cursor.pos,
                    expected: "':' or ']'".to_owned(),
                    found: cursor.found(),
                })
            }
            None => {
                return Err(ParseError::UnexpectedEnd {
                    offset: cursor.pos,
                    expected: "']'".to_owned(),
                })
            }
        }
    }
}

fn parse_node(cursor: &mut Cursor) -> Result<TaggedNode, ParseError> {
    cursor.skip()?;
    let name = parse_ident(cursor)?.unwrap_or_default();

    cursor.skip()?;
    let length = if cursor.peek() == Some(':') {
        cursor.pos += 1;
        cursor.skip()?;
        parse_length(cursor)?
    } else {
        0.
    };

    cursor.skip()?;
    let tags = if cursor.peek() == Some('[') && cursor.starts_nhx() {
        parse_tagmap(cursor)?
    } else {
        BTreeMap::new()
    };

    Ok(TaggedNode { name, length, tags })
}

fn parse_subtree(cursor: &mut Cursor) -> Result<RawTree, ParseError> {
    cursor.skip()?;

    let mut children = Vec::new();

    if cursor.peek() == Some('(') {
        cursor.pos += 1;
        children.push(parse_subtree(cursor)?);

        loop {
            cursor.skip()?;
            match cursor.peek() {
                Some(',') => {
                    cursor.pos += 1;
                    children.push(parse_subtree(cursor)?);
                }
                Some(')') => {
                    cursor.pos += 1;
                    break;
                }
                Some(_) => {
                    return Err(ParseError::Syntax {
                        offset: cursor.pos,
                        expected: "',' or ')'".to_owned(),
                        found: cursor.found(),
                    })
                }
                None => {
                    return Err(ParseError::UnexpectedEnd {
                        offset: cursor.pos,
                        expected: "')'".to_owned(),
                    })
                }
            }
        }
    }

    let node = parse_node(cursor)?;
    Ok(RawTree { node, children })
}

fn graft(tree: &mut Tree<TaggedNode>, parent: NodeID, raw: RawTree) {
    let id = tree.add_node(raw.node, parent);
    for child in raw.children {
        graft(tree, id, child);
    }
}

/// Parse a NHX-formatted string into a tree of tagged nodes.
pub fn parse_tree(input: &str) -> Result<Tree<TaggedNode>, ParseError> {
    let mut cursor = Cursor::new(input);

    let raw = parse_subtree(&mut cursor)?;
    cursor.skip()?;
    cursor.expect(';')?;
    cursor.skip()?;

    if let Some(c) = cursor.peek() {
        return Err(ParseError::Syntax {
            offset: cursor.pos,
            expected: "<end>".to_owned(),
            found: format!("'{}'", c),
        });
    }

    let mut tree = Tree::new(raw.node);
    let root = tree.root();
    for child in raw.children {
        graft(&mut tree, root, child);
    }

    Ok(tree)
}

/// Quote an identifier if it contains delimiter characters.
fn escape_ident(source: &str) -> String {
    if !source.chars().any(|c| DELIMITERS.contains(c)) {
        return source.to_owned();
    }

    let mut out = String::with_capacity(source.len() + 2);
    out.push('"');
    for c in source.chars() {
        if c == '"' {
            out.push_str("\"\"");
        } else {
            out.push(c);
        }
    }
    out.push('"');
    out
}

fn write_subtree(out: &mut String, tree: &Tree<TaggedNode>, n: NodeID) {
    if !tree.is_leaf(n) {
        out.push('(');
        for (i, &child) in tree.children(n).iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            write_subtree(out, tree, child);
        }
        out.push(')');
    }

    let node = &tree[n].value;

    if !node.name.is_empty() {
        out.push_str(&escape_ident(&node.name));
    }

    if node.length != 0. {
        let _ = write!(out, ":{}", node.length);
    }

    if !node.tags.is_empty() {
        out.push_str("[&&NHX");
        for (key, value) in &node.tags {
            let _ = write!(out, ":{}={}", escape_ident(key), escape_ident(value));
        }
        out.push(']');
    }
}

/// Serialize a tree of tagged nodes into its NHX representation.
pub fn write_tree(tree: &Tree<TaggedNode>) -> String {
    let mut out = String::new();
    write_subtree(&mut out, tree, tree.root());
    out.push(';');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn parses_single_node() {
        let tree = parse_tree("hello;").unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[tree.root()].value.name, "hello");
    }

    #[test]
    fn parses_anonymous_nodes() {
        let tree = parse_tree("(,,);").unwrap();
        assert_eq!(tree.len(), 4);
        assert_eq!(tree.number_of_children(tree.root()), 3);

        for &child in tree.children(tree.root()) {
            assert_eq!(tree[child].value, TaggedNode::default());
        }
    }

    #[test]
    fn parses_lengths_and_tags() {
        let tree = parse_tree(
            "(left:0.5,right[&&NHX:event=loss])root[&&NHX:event=duplication:segment=\"0 - 2\"];",
        )
        .unwrap();

        let root = &tree[tree.root()].value;
        assert_eq!(root.name, "root");
        assert_eq!(
            root.tags,
            tags(&[("event", "duplication"), ("segment", "0 - 2")])
        );

        let left = &tree[tree.child(tree.root(), 0)].value;
        assert_eq!(left.name, "left");
        assert_eq!(left.length, 0.5);
        assert!(left.tags.is_empty());

        let right = &tree[tree.child(tree.root(), 1)].value;
        assert_eq!(right.tags, tags(&[("event", "loss")]));
    }

    #[test]
    fn parses_quoted_names() {
        let tree = parse_tree("\"a b\"\"c\";").unwrap();
        assert_eq!(tree[tree.root()].value.name, "a b\"c");

        let tree = parse_tree("(\"x x' x''\",y)z;").unwrap();
        assert_eq!(tree[tree.child(tree.root(), 0)].value.name, "x x' x''");
    }

    #[test]
    fn skips_comments_and_whitespace() {
        let tree = parse_tree(
            "(\n  a [this is a comment] ,\n  b\n) [another one] root;",
        )
        .unwrap();

        assert_eq!(tree.len(), 3);
        assert_eq!(tree[tree.root()].value.name, "root");
    }

    #[test]
    fn rejects_syntax_errors() {
        assert!(matches!(
            parse_tree("(a,b"),
            Err(ParseError::UnexpectedEnd { .. })
        ));

        assert!(matches!(
            parse_tree("(a,b);junk;"),
            Err(ParseError::Syntax { .. })
        ));

        match parse_tree("(a;b);") {
            Err(ParseError::Syntax { offset, .. }) => assert_eq!(offset, 2),
            other => panic!("unexpected result: {:?}", other),
        }

        assert!(parse_tree("a[&&NHX];").is_err());
    }

    #[test]
    fn writes_escaped_idents() {
        let mut tree = Tree::new(TaggedNode {
            name: "x x' x''".to_owned(),
            length: 0.,
            tags: tags(&[("event", "duplication")]),
        });
        tree.add_node(
            TaggedNode { name: "plain".to_owned(), length: 0., tags: BTreeMap::new() },
            tree.root(),
        );
        tree.add_node(TaggedNode::default(), tree.root());

        assert_eq!(
            write_tree(&tree),
            "(plain,)\"x x' x''\"[&&NHX:event=duplication];"
        );
    }

    #[test]
    fn round_trip() {
        let source =
            "((\"a b\",)x[&&NHX:event=speciation],(y:1.5,z)\"w w\"[&&NHX:event=duplication:segment=\"1 - 2\"])\"a b w w\"[&&NHX:event=duplication];";
        let tree = parse_tree(source).unwrap();
        assert_eq!(write_tree(&tree), source);
    }
}
