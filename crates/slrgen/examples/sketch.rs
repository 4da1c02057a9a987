use slrgen::grammar::{Grammar, SymbolID::*};

fn main() -> anyhow::Result<()> {
    let grammar = Grammar::define(|g| {
        let t_ident = g.terminal("ID")?;
        let t_num = g.terminal("NUM")?;
        let t_plus = g.terminal("PLUS")?;
        let t_equal = g.terminal("EQUAL")?;

        let e_a = g.nonterminal("A")?;
        let e_e = g.nonterminal("E")?;
        let e_t = g.nonterminal("T")?;

        g.production(e_a, [N(e_e), T(t_equal), N(e_e)])?;
        g.production(e_e, [N(e_e), T(t_plus), N(e_t)])?;
        g.production(e_e, [N(e_t)])?;
        g.production(e_t, [T(t_num)])?;
        g.production(e_t, [T(t_ident)])?;

        g.start_symbol(e_a)
    })?;
    println!("{}", grammar);

    let analysis = slrgen::analyze(&grammar)?;
    println!("{}", analysis.actions.display(&grammar));

    // 1 + 2 = a
    let tokens: Vec<_> = ["NUM", "PLUS", "NUM", "EQUAL", "ID"]
        .into_iter()
        .filter_map(|name| grammar.terminal_by_name(name))
        .collect();
    let accepted = analysis.parse(&grammar, &tokens)?;
    print!(
        "{}",
        slrgen::display_reductions(&grammar, &accepted.reductions)
    );

    Ok(())
}
