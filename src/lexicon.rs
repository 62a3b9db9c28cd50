//! Heuristic term sets used across the pipeline. They are hand-maintained
//! investigation vocabulary, kept in one place as overridable data so they
//! can be unit-tested and extended without touching control flow.

/// Header keywords whose co-occurrence (>= 3) marks a wallet/payment-platform
/// text export.
pub const WALLET_HEADER_KEYWORDS: &[&str] = &[
    "用户ID",
    "交易单号",
    "大单号",
    "用户侧账号名称",
    "借贷类型",
    "交易业务类型",
    "交易用途类型",
];

pub const WALLET_KEYWORD_MIN_HITS: usize = 3;

/// A delimited-text header row must contain one keyword from each list.
pub const TIME_HEADER_KEYWORDS: &[&str] = &[
    "交易时间",
    "交易日期",
    "记账日期",
    "入账时间",
    "日期",
    "时间",
    "time",
    "date",
];

pub const AMOUNT_HEADER_KEYWORDS: &[&str] = &[
    "金额",
    "交易金额",
    "发生额",
    "amount",
    "money",
];

/// Key transaction fields; a PDF page table is only accepted when its header
/// mentions at least one of them.
pub const PDF_KEY_FIELDS: &[&str] = &["交易时间", "交易单号", "金额", "交易对方"];

/// Credit markers force a positive amount, debit markers a negative one.
/// A marker column always outranks the type-keyword signal.
pub const CREDIT_MARKERS: &[&str] = &["入", "收", "收入", "贷", "credit"];
pub const DEBIT_MARKERS: &[&str] = &["出", "支", "支出", "借", "debit"];

pub const EXPENSE_TYPE_KEYWORDS: &[&str] = &["消费", "付款", "支付", "转出", "提现", "扣费"];
pub const INCOME_TYPE_KEYWORDS: &[&str] = &["退款", "入账", "收款", "转入", "充值", "退回"];

/// Payment-channel and system noise terms excluded before counterparty
/// frequency inference.
pub const COUNTERPARTY_STOPWORDS: &[&str] = &[
    "余额",
    "余额支付",
    "零钱",
    "零钱通",
    "理财通",
    "信用卡还款",
    "提现",
    "充值",
    "退款",
    "扫码收款",
    "转账",
    "转入",
    "转出",
    "系统",
    "商户平台",
    "对公账户",
    "微信支付",
    "支付宝",
    "银行卡",
    "快捷支付",
    "网银",
    "自动扣款",
    "代扣",
    "批量代收",
    "批量代付",
    "批量转账",
    "红包",
    "群收款",
    "AA收款",
    "面对面收款",
    "二维码收款",
    "信用卡",
    "借记卡",
    "储蓄卡",
    "花呗",
    "借呗",
    "网商银行",
    "余额宝",
    "理财",
    "基金",
    "保险",
    "生活缴费",
    "手机充值",
    "水电费",
    "燃气费",
    "宽带费",
    "交通罚款",
    "违章缴费",
    "ETC",
    "加油",
    "停车费",
    "话费充值",
    "流量充值",
    "游戏充值",
    "会员充值",
    "购物",
    "消费",
    "支付",
    "付款",
    "收款",
    "到账",
    "成功",
    "失败",
    "处理中",
    "待处理",
    "已撤销",
    "未知",
    "其他",
    "平台",
    "服务",
    "手续费",
];

/// Values starting with one of these are channel noise even when the full
/// string is not an exact stop-word.
pub const COUNTERPARTY_STOP_PREFIXES: &[&str] = &[
    "余额", "零钱", "信用卡", "提现", "充值", "转账", "退款", "微信", "支付宝", "银行卡",
    "快捷", "网银", "自动", "代扣", "批量", "红包", "群收", "二维码", "借记", "储蓄",
    "花呗", "借呗", "网商", "余额宝", "理财", "基金", "保险", "生活", "手机", "水电",
    "燃气", "宽带", "交通", "违章", "ETC", "加油", "停车", "话费", "流量", "游戏",
    "会员", "手续费",
];

/// Owner-name placeholders the resolver is allowed to replace.
pub const PLACEHOLDER_NAMES: &[&str] = &["未知", "unknown", "无", "nan", "none", "null"];

/// Counterparty name fragments that mark investigation-relevant merchants.
pub const KEY_COUNTERPARTY_KEYWORDS: &[&str] = &[
    "烟酒", "副食", "小卖", "回收", "维修", "摩托车", "汽修", "手机", "废旧", "金属", "超市",
];

/// Heuristic vocabulary bundle handed to the coercer and resolver. Defaults
/// carry the built-in lists; callers may swap in extended sets.
#[derive(Debug, Clone)]
pub struct Lexicon {
    pub counterparty_stopwords: Vec<String>,
    pub counterparty_stop_prefixes: Vec<String>,
    pub expense_type_keywords: Vec<String>,
    pub income_type_keywords: Vec<String>,
    pub credit_markers: Vec<String>,
    pub debit_markers: Vec<String>,
    pub placeholder_names: Vec<String>,
}

impl Default for Lexicon {
    fn default() -> Self {
        fn owned(items: &[&str]) -> Vec<String> {
            items.iter().map(|s| (*s).to_string()).collect()
        }
        Lexicon {
            counterparty_stopwords: owned(COUNTERPARTY_STOPWORDS),
            counterparty_stop_prefixes: owned(COUNTERPARTY_STOP_PREFIXES),
            expense_type_keywords: owned(EXPENSE_TYPE_KEYWORDS),
            income_type_keywords: owned(INCOME_TYPE_KEYWORDS),
            credit_markers: owned(CREDIT_MARKERS),
            debit_markers: owned(DEBIT_MARKERS),
            placeholder_names: owned(PLACEHOLDER_NAMES),
        }
    }
}

impl Lexicon {
    pub fn is_counterparty_noise(&self, value: &str) -> bool {
        let value = value.trim();
        if value.is_empty() {
            return true;
        }
        if self.counterparty_stopwords.iter().any(|w| w == value) {
            return true;
        }
        self.counterparty_stop_prefixes
            .iter()
            .any(|p| value.starts_with(p.as_str()))
    }
}
