// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// DIFERENCIAL DE TOKENS (LCS)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Diferença entre duas sequências de tokens normalizados via maior
// subsequência comum. Blocos de remoção e inserção entre dois trechos
// iguais viram `Replace`.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use std::ops::Range;

/// Limite de tokens por lado (a tabela LCS é quadrática)
pub const MAX_DIFF_TOKENS: usize = 400;

/// Operação do diferencial (intervalos em índices de token)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffOp {
    /// Trecho igual nos dois lados
    Equal { source: Range<usize>, target: Range<usize> },
    /// Trecho só na origem
    Delete { source: Range<usize> },
    /// Trecho só no destino
    Insert { target: Range<usize> },
    /// Trecho da origem substituído por trecho do destino
    Replace { source: Range<usize>, target: Range<usize> },
}

#[derive(Clone, Copy)]
enum Step {
    Equal,
    Delete,
    Insert,
}

/// Calcula o diferencial; `None` se alguma sequência passa do limite
pub fn diff_tokens<T: PartialEq>(source: &[T], target: &[T]) -> Option<Vec<DiffOp>> {
    if source.len() > MAX_DIFF_TOKENS || target.len() > MAX_DIFF_TOKENS {
        return None;
    }

    let n = source.len();
    let m = target.len();

    // lcs[i][j] = LCS de source[i..] e target[j..]
    let mut lcs = vec![vec![0u16; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lcs[i][j] = if source[i] == target[j] {
                lcs[i + 1][j + 1] + 1
            } else {
                lcs[i + 1][j].max(lcs[i][j + 1])
            };
        }
    }

    let mut steps = Vec::with_capacity(n + m);
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if source[i] == target[j] {
            steps.push(Step::Equal);
            i += 1;
            j += 1;
        } else if lcs[i + 1][j] >= lcs[i][j + 1] {
            steps.push(Step::Delete);
            i += 1;
        } else {
            steps.push(Step::Insert);
            j += 1;
        }
    }
    steps.extend(std::iter::repeat(Step::Delete).take(n - i));
    steps.extend(std::iter::repeat(Step::Insert).take(m - j));

    Some(group_steps(&steps))
}

fn group_steps(steps: &[Step]) -> Vec<DiffOp> {
    let mut ops = Vec::new();
    let (mut i, mut j) = (0usize, 0usize);
    let mut equal_start: Option<(usize, usize)> = None;
    let mut pending_delete: Option<usize> = None;
    let mut pending_insert: Option<usize> = None;

    let flush_changes = |ops: &mut Vec<DiffOp>, del: Option<usize>, ins: Option<usize>, i: usize, j: usize| {
        match (del, ins) {
            (Some(d), Some(s)) => ops.push(DiffOp::Replace {
                source: d..i,
                target: s..j,
            }),
            (Some(d), None) => ops.push(DiffOp::Delete { source: d..i }),
            (None, Some(s)) => ops.push(DiffOp::Insert { target: s..j }),
            (None, None) => {}
        }
    };

    for step in steps {
        match step {
            Step::Equal => {
                flush_changes(&mut ops, pending_delete.take(), pending_insert.take(), i, j);
                if equal_start.is_none() {
                    equal_start = Some((i, j));
                }
                i += 1;
                j += 1;
            }
            Step::Delete | Step::Insert => {
                if let Some((si, sj)) = equal_start.take() {
                    ops.push(DiffOp::Equal {
                        source: si..i,
                        target: sj..j,
                    });
                }
                if matches!(step, Step::Delete) {
                    pending_delete.get_or_insert(i);
                    i += 1;
                } else {
                    pending_insert.get_or_insert(j);
                    j += 1;
                }
            }
        }
    }

    if let Some((si, sj)) = equal_start {
        ops.push(DiffOp::Equal {
            source: si..i,
            target: sj..j,
        });
    }
    flush_changes(&mut ops, pending_delete, pending_insert, i, j);

    ops
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(text: &str) -> Vec<String> {
        text.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn test_identical_is_single_equal() {
        let a = words("o gato dorme");
        let ops = diff_tokens(&a, &a).unwrap();
        assert_eq!(
            ops,
            vec![DiffOp::Equal {
                source: 0..3,
                target: 0..3
            }]
        );
    }

    #[test]
    fn test_single_replacement() {
        let ops = diff_tokens(&words("o felino dorme"), &words("o gato dorme")).unwrap();
        assert_eq!(
            ops,
            vec![
                DiffOp::Equal { source: 0..1, target: 0..1 },
                DiffOp::Replace { source: 1..2, target: 1..2 },
                DiffOp::Equal { source: 2..3, target: 2..3 },
            ]
        );
    }

    #[test]
    fn test_moved_token_is_delete_and_insert() {
        let ops = diff_tokens(&words("ontem joão saiu"), &words("joão saiu ontem")).unwrap();
        assert_eq!(
            ops,
            vec![
                DiffOp::Delete { source: 0..1 },
                DiffOp::Equal { source: 1..3, target: 0..2 },
                DiffOp::Insert { target: 2..3 },
            ]
        );
    }

    #[test]
    fn test_empty_sides() {
        assert_eq!(
            diff_tokens(&words(""), &words("novo texto")).unwrap(),
            vec![DiffOp::Insert { target: 0..2 }]
        );
        assert!(diff_tokens::<String>(&[], &[]).unwrap().is_empty());
    }

    #[test]
    fn test_too_long_is_rejected() {
        let long: Vec<usize> = (0..MAX_DIFF_TOKENS + 1).collect();
        assert!(diff_tokens(&long, &long).is_none());
    }
}
