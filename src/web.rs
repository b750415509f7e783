pub const INDEX_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>Fleet Console</title>
<style>
*{box-sizing:border-box;margin:0;padding:0}
body{font-family:-apple-system,BlinkMacSystemFont,'Segoe UI',Roboto,sans-serif;background:#0f1117;color:#e1e4e8;min-height:100vh;padding:16px}
h1{font-size:20px;color:#58a6ff}
h2{font-size:14px;font-weight:600;color:#8b949e;text-transform:uppercase;letter-spacing:1px;margin-bottom:8px}
.grid{display:grid;grid-template-columns:1fr 1fr;gap:12px;max-width:1000px;margin:0 auto}
.full{grid-column:1/-1}
.card{background:#161b22;border:1px solid #30363d;border-radius:8px;padding:14px}
.status-bar{display:flex;gap:12px;flex-wrap:wrap;align-items:center}
.badge{padding:3px 10px;border-radius:12px;font-size:12px;font-weight:600;text-transform:uppercase}
.badge-connecting{background:#30363d;color:#8b949e}
.badge-live{background:#238636;color:#fff}
.badge-degraded{background:#d29922;color:#000}
.badge-unavailable{background:#da3633;color:#fff}
.toggle{display:flex;align-items:center;gap:8px;margin:4px 0;font-size:13px}
input[type=text]{background:#0d1117;border:1px solid #30363d;color:#e1e4e8;padding:6px 10px;border-radius:4px;font-size:13px;width:100%}
input:focus{outline:none;border-color:#58a6ff}
.row{display:flex;gap:8px;align-items:center}
button{padding:6px 12px;border:none;border-radius:6px;font-size:12px;font-weight:600;cursor:pointer}
.btn-primary{background:#238636;color:#fff}
.btn-danger{background:#da3633;color:#fff}
.btn-muted{background:#30363d;color:#e1e4e8}
.worker{border-bottom:1px solid #21262d;padding:6px 0;font-size:13px}
.worker-head{display:flex;gap:12px;align-items:center;cursor:pointer}
.worker-detail{color:#8b949e;font-size:12px;padding:4px 0 0 18px;font-family:'SF Mono',Monaco,Consolas,monospace}
.pos{color:#3fb950}.neg{color:#f85149}
.placeholder{color:#484f58;font-style:italic;padding:8px 0}
.events{max-height:240px;overflow-y:auto;font-size:12px;font-family:'SF Mono',Monaco,Consolas,monospace}
.ev{padding:3px 0;border-bottom:1px solid #21262d;display:flex;gap:8px}
.ev-ts{color:#484f58;min-width:55px}
.ev-error{color:#f85149}.ev-warn{color:#d29922}.ev-info{color:#c9d1d9}
</style>
</head>
<body>
<div class="grid">

<div class="card full">
  <div style="display:flex;justify-content:space-between;align-items:center">
    <h1>Fleet Console</h1>
    <div class="status-bar">
      <span id="connBadge" class="badge badge-connecting">CONNECTING</span>
      <span id="header"></span>
    </div>
  </div>
</div>

<div class="card">
  <h2>Settings</h2>
  <div id="settings"></div>
</div>

<div class="card">
  <h2>Notifications</h2>
  <div id="events" class="events"></div>
</div>

<div class="card full" id="lists"></div>

</div>

<script>
const API = '';
let view = null;
const listDom = {};

async function post(path, body) {
  const res = await fetch(API + path, {
    method: 'POST',
    headers: {'Content-Type': 'application/json'},
    body: JSON.stringify(body || {}),
  });
  if (!res.ok) console.warn(path, await res.text());
  refresh();
}

function esc(s) {
  return String(s).replace(/[&<>"']/g, c => ({'&':'&amp;','<':'&lt;','>':'&gt;','"':'&quot;',"'":'&#39;'}[c]));
}

const seg = encodeURIComponent;

function rowPath(list, key, action) {
  return `/api/lists/${seg(list)}/rows/${seg(key)}/${action}`;
}

// Handlers read identifiers from data- attributes; nothing is spliced into JS.
document.addEventListener('change', ev => {
  const el = ev.target;
  if (el.dataset.flag !== undefined) post(`/api/flags/${seg(el.dataset.flag)}`, {value: el.checked});
});

document.addEventListener('input', ev => {
  const el = ev.target;
  if (el.dataset.filter !== undefined) post(`/api/lists/${seg(el.dataset.filter)}/filter`, {term: el.value});
});

document.addEventListener('click', ev => {
  const el = ev.target.closest('[data-action]');
  if (!el) return;
  const {action, list, key} = el.dataset;
  if (action === 'clear') {
    listDom[list].input.value = '';
    post(`/api/lists/${seg(list)}/filter/clear`);
  } else {
    post(rowPath(list, key, action));
  }
});

function renderFlags() {
  const header = [], settings = [];
  for (const [flag, surfaces] of Object.entries(view.flags)) {
    for (const [surface, value] of Object.entries(surfaces)) {
      const html = `<label class="toggle"><input type="checkbox" data-flag="${esc(flag)}" ${value ? 'checked' : ''}> ${esc(flag)}</label>`;
      (surface === 'header' ? header : settings).push(html);
    }
  }
  document.getElementById('header').innerHTML = header.join('');
  document.getElementById('settings').innerHTML = settings.join('');
}

function ensureListCard(list) {
  if (listDom[list]) return listDom[list];
  const card = document.createElement('div');
  card.innerHTML = `<h2>${esc(list)}</h2>
    <div class="row" style="margin-bottom:8px">
      <input type="text" placeholder="filter" data-filter="${esc(list)}">
      <button class="btn-muted" data-action="clear" data-list="${esc(list)}" style="display:none">clear</button>
    </div>
    <div></div>`;
  document.getElementById('lists').appendChild(card);
  listDom[list] = {
    input: card.querySelector('input'),
    clear: card.querySelector('button'),
    rows: card.lastElementChild,
    rebuilds: -1,
    byKey: new Map(),
  };
  return listDom[list];
}

function rowHtml(list, key) {
  return `<div class="worker">
    <div class="worker-head" data-action="toggle" data-list="${esc(list)}" data-key="${esc(key)}">
      <strong>${esc(key)}</strong><span class="status"></span><span class="pnl"></span>
      <button class="btn-primary" data-action="start" data-list="${esc(list)}" data-key="${esc(key)}">start</button>
      <button class="btn-danger" data-action="stop" data-list="${esc(list)}" data-key="${esc(key)}">stop</button>
    </div><div class="worker-detail"></div></div>`;
}

function patchRow(el, row, shown) {
  const e = row.entity;
  el.style.display = shown ? '' : 'none';
  el.querySelector('.status').textContent = e.status;
  const pnl = el.querySelector('.pnl');
  pnl.textContent = e.pnl;
  pnl.className = 'pnl ' + (Number(e.pnl) >= 0 ? 'pos' : 'neg');
  const detail = el.querySelector('.worker-detail');
  detail.style.display = row.sub_state.expanded ? '' : 'none';
  detail.textContent = `size ${e.positionSize} · entry ${e.entryPrice}`;
}

function renderLists() {
  for (const [list, lv] of Object.entries(view.lists)) {
    const dom = ensureListCard(list);
    dom.clear.style.display = lv.clear_visible ? '' : 'none';
    if (lv.rebuilds !== dom.rebuilds) {
      dom.rebuilds = lv.rebuilds;
      dom.byKey.clear();
      if (lv.placeholder) {
        dom.rows.innerHTML = '<div class="placeholder">no active workers</div>';
      } else {
        dom.rows.innerHTML = lv.rows.map(r => rowHtml(list, r.entity.symbol)).join('');
        lv.rows.forEach((r, i) => dom.byKey.set(r.entity.symbol, dom.rows.children[i]));
      }
    }
    const visible = lv.visible ? new Set(lv.visible) : null;
    for (const r of lv.rows) {
      const el = dom.byKey.get(r.entity.symbol);
      if (el) patchRow(el, r, !visible || visible.has(r.entity.symbol));
    }
  }
}

function renderConnection() {
  const badge = document.getElementById('connBadge');
  const state = view.connection.state;
  badge.className = 'badge badge-' + state;
  badge.textContent = state.toUpperCase();
  badge.title = view.connection.detail || '';
}

function renderEvents() {
  document.getElementById('events').innerHTML = [...view.notifications].reverse()
    .map(n => `<div class="ev ev-${esc(n.level)}"><span class="ev-ts">${esc(n.ts)}</span><span>${esc(n.message)}</span></div>`)
    .join('');
}

async function refresh() {
  try {
    const res = await fetch(API + '/api/view');
    view = await res.json();
    renderConnection();
    renderFlags();
    renderLists();
    renderEvents();
  } catch (e) {
    console.warn('view refresh failed', e);
  }
}

refresh();
setInterval(refresh, 1000);
</script>
</body>
</html>
"##;
